//! statistical-analyzer block
//!
//! Descriptive statistics, Pearson correlation, two-sample t-tests, and a
//! Jarque-Bera normality check, each with an LLM interpretation and an
//! optional rendered visualization.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use tablequery::{
    Table,
    table::{as_f64, display_value},
};

use super::{Block, BlockContext, BlockError, parse_params};
use crate::llm::{CompletionRequest, LlmOptions};
use crate::prompts::embedded;

const INTERPRET_TEMPERATURE: f32 = 0.3;

/// Threshold above which the interpretation call streams
const STREAM_TOKEN_THRESHOLD: u32 = 4096;

/// Correlations at or above this magnitude are reported as significant
const CORRELATION_THRESHOLD: f64 = 0.5;

/// Supported analyses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    DescriptiveStats,
    Correlation,
    TTest,
    NormalityTest,
}

/// Variable selection for the analysis
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Variables {
    /// Variables for correlation (defaults to all numeric columns)
    #[serde(default)]
    pub independent: Vec<String>,

    /// Measured variable for t-test / normality
    #[serde(default)]
    pub dependent: Option<String>,

    /// Grouping column for t-test
    #[serde(default)]
    pub group_column: Option<String>,
}

/// statistical-analyzer inputs
#[derive(Debug, Deserialize)]
pub struct StatsParams {
    pub data_table: Table,
    pub analysis_type: AnalysisType,
    #[serde(default)]
    pub variables: Variables,
    #[serde(default)]
    pub llm: LlmOptions,
}

/// Perform statistical analysis with AI-powered interpretation
pub async fn analyze(params: &StatsParams, ctx: &BlockContext) -> Result<Value, BlockError> {
    debug!(analysis_type = ?params.analysis_type, "analyze: called");
    ctx.host.report_progress(0);

    let table = &params.data_table;
    if table.is_empty() {
        return Err(BlockError::InvalidInput("Data table is empty".to_string()));
    }

    ctx.host.report_progress(20);

    let (test_result, visualization) = match params.analysis_type {
        AnalysisType::DescriptiveStats => (descriptive_stats(table)?, None),
        AnalysisType::Correlation => {
            let variables = if params.variables.independent.is_empty() {
                numeric_columns(table)
            } else {
                params.variables.independent.clone()
            };
            if variables.len() < 2 {
                return Err(BlockError::InvalidInput(
                    "Correlation analysis requires at least 2 numeric variables".to_string(),
                ));
            }
            let result = correlation(table, &variables)?;
            let viz = render_heatmap(table, &variables, ctx);
            (result, viz)
        }
        AnalysisType::TTest => {
            let dependent = params.variables.dependent.clone().ok_or_else(|| {
                BlockError::InvalidInput("T-test requires 'dependent' variable and 'group_column' in variables".to_string())
            })?;
            let group_column = params.variables.group_column.clone().ok_or_else(|| {
                BlockError::InvalidInput("T-test requires 'dependent' variable and 'group_column' in variables".to_string())
            })?;
            let result = t_test(table, &dependent, &group_column)?;
            let viz = render_boxplot(table, &dependent, &group_column, ctx);
            (result, viz)
        }
        AnalysisType::NormalityTest => {
            let dependent = match params.variables.dependent.clone() {
                Some(dep) => dep,
                None => numeric_columns(table).into_iter().next().ok_or_else(|| {
                    BlockError::InvalidInput("No numeric columns found for normality test".to_string())
                })?,
            };
            let result = normality_test(table, &dependent)?;
            let viz = render_histogram(table, &dependent, ctx);
            (result, viz)
        }
    };

    ctx.host.report_progress(60);

    let interpretation = interpret(params, &test_result, ctx).await?;

    ctx.host.report_progress(90);
    ctx.host.report_progress(100);

    Ok(json!({
        "test_result": test_result,
        "interpretation": interpretation,
        "visualization": visualization,
    }))
}

/// Columns whose every non-null value is a JSON number
pub fn numeric_columns(table: &Table) -> Vec<String> {
    table
        .columns
        .iter()
        .filter(|column| {
            let mut any = false;
            for value in table.column_values(column) {
                match value {
                    Value::Null => continue,
                    Value::Number(_) => any = true,
                    _ => return false,
                }
            }
            any
        })
        .cloned()
        .collect()
}

/// Describe every numeric column: count, mean, std, min, quartiles, max
pub fn descriptive_stats(table: &Table) -> Result<Value, BlockError> {
    let columns = numeric_columns(table);
    if columns.is_empty() {
        return Err(BlockError::InvalidInput("No numeric columns found in data".to_string()));
    }

    let mut summary = Map::new();
    for column in &columns {
        let mut values = table.numeric_values(column);
        values.sort_by(|a, b| a.partial_cmp(b).expect("NaN in numeric column"));
        let n = values.len();
        let mean = values.iter().sum::<f64>() / n as f64;
        summary.insert(
            column.clone(),
            json!({
                "count": n,
                "mean": mean,
                "std": sample_std(&values, mean),
                "min": values[0],
                "25%": quantile(&values, 0.25),
                "50%": quantile(&values, 0.5),
                "75%": quantile(&values, 0.75),
                "max": values[n - 1],
            }),
        );
    }

    Ok(json!({
        "summary": summary,
        "columns": columns,
        "row_count": table.row_count(),
    }))
}

/// Pearson correlation matrix plus significant pairs
pub fn correlation(table: &Table, variables: &[String]) -> Result<Value, BlockError> {
    let all = numeric_columns(table);
    let numeric: Vec<&String> = variables.iter().filter(|v| all.contains(*v)).collect();
    if numeric.len() < 2 {
        return Err(BlockError::InvalidInput(
            "Correlation analysis requires at least 2 numeric variables".to_string(),
        ));
    }

    let series: Vec<(String, Vec<f64>)> = numeric
        .iter()
        .map(|name| ((*name).clone(), table.numeric_values(name)))
        .collect();

    let mut matrix = Map::new();
    let mut significant = Vec::new();
    for (i, (name_a, values_a)) in series.iter().enumerate() {
        let mut row = Map::new();
        for (j, (name_b, values_b)) in series.iter().enumerate() {
            let r = pearson(values_a, values_b);
            row.insert(name_b.clone(), json!(r));
            if j > i && r.abs() >= CORRELATION_THRESHOLD {
                significant.push(json!({
                    "var1": name_a,
                    "var2": name_b,
                    "correlation": r,
                    "strength": if r.abs() >= 0.7 { "strong" } else { "moderate" },
                }));
            }
        }
        matrix.insert(name_a.clone(), Value::Object(row));
    }

    Ok(json!({
        "method": "Pearson",
        "correlation_matrix": matrix,
        "variables": numeric,
        "significant_correlations": significant,
    }))
}

/// Independent two-sample t-test (pooled variance) with Cohen's d
pub fn t_test(table: &Table, dependent: &str, group_column: &str) -> Result<Value, BlockError> {
    let groups = table.unique_values(group_column);
    if groups.len() != 2 {
        return Err(BlockError::InvalidInput(format!(
            "T-test requires exactly 2 groups, found {}",
            groups.len()
        )));
    }

    let values_of = |group: &Value| -> Vec<f64> {
        table
            .rows
            .iter()
            .filter(|row| row.get(group_column).unwrap_or(&Value::Null) == group)
            .filter_map(|row| row.get(dependent).and_then(as_f64))
            .collect()
    };
    let a = values_of(&groups[0]);
    let b = values_of(&groups[1]);
    if a.len() < 2 || b.len() < 2 {
        return Err(BlockError::InvalidInput(
            "T-test requires at least 2 observations per group".to_string(),
        ));
    }

    let (mean_a, mean_b) = (mean(&a), mean(&b));
    let (std_a, std_b) = (sample_std(&a, mean_a), sample_std(&b, mean_b));
    let (n_a, n_b) = (a.len() as f64, b.len() as f64);

    let pooled_var = ((n_a - 1.0) * std_a * std_a + (n_b - 1.0) * std_b * std_b) / (n_a + n_b - 2.0);
    let pooled_std = pooled_var.sqrt();
    let standard_error = (pooled_var * (1.0 / n_a + 1.0 / n_b)).sqrt();
    let t_statistic = if standard_error == 0.0 { 0.0 } else { (mean_a - mean_b) / standard_error };
    let df = n_a + n_b - 2.0;
    let p_value = student_t_two_sided_p(t_statistic, df);
    let cohens_d = if pooled_std == 0.0 { 0.0 } else { (mean_a - mean_b) / pooled_std };

    let mut groups_json = Map::new();
    groups_json.insert(
        display_value(&groups[0]),
        json!({"mean": mean_a, "std": std_a, "n": a.len()}),
    );
    groups_json.insert(
        display_value(&groups[1]),
        json!({"mean": mean_b, "std": std_b, "n": b.len()}),
    );

    Ok(json!({
        "test": "Independent T-Test",
        "dependent_variable": dependent,
        "group_variable": group_column,
        "groups": groups_json,
        "t_statistic": t_statistic,
        "p_value": p_value,
        "cohens_d": cohens_d,
        "significant": p_value < 0.05,
    }))
}

/// Jarque-Bera normality test (chi-square with 2 degrees of freedom)
pub fn normality_test(table: &Table, variable: &str) -> Result<Value, BlockError> {
    let values = table.numeric_values(variable);
    if values.len() < 3 {
        return Err(BlockError::InvalidInput(
            "Normality test requires at least 3 data points".to_string(),
        ));
    }

    let n = values.len() as f64;
    let m = mean(&values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();

    let (skewness, excess_kurtosis) = if std == 0.0 {
        (0.0, 0.0)
    } else {
        let m3 = values.iter().map(|v| ((v - m) / std).powi(3)).sum::<f64>() / n;
        let m4 = values.iter().map(|v| ((v - m) / std).powi(4)).sum::<f64>() / n;
        (m3, m4 - 3.0)
    };

    let jb = n / 6.0 * (skewness * skewness + excess_kurtosis * excess_kurtosis / 4.0);
    // Chi-square survival with 2 dof has the closed form exp(-x/2)
    let p_value = (-jb / 2.0).exp();

    Ok(json!({
        "test": "Jarque-Bera Normality Test",
        "variable": variable,
        "statistic": jb,
        "skewness": skewness,
        "excess_kurtosis": excess_kurtosis,
        "p_value": p_value,
        "is_normal": p_value >= 0.05,
        "sample_size": values.len(),
        "mean": m,
        "std": sample_std(&values, m),
    }))
}

async fn interpret(params: &StatsParams, test_result: &Value, ctx: &BlockContext) -> Result<String, BlockError> {
    let result_json = serde_json::to_string_pretty(test_result).unwrap_or_default();
    let asks = match params.analysis_type {
        AnalysisType::DescriptiveStats => {
            "1. Key measures of central tendency (mean, median)\n\
             2. Variability (standard deviation, range)\n\
             3. Any notable patterns or outliers"
        }
        AnalysisType::Correlation => {
            "1. Strength and direction of significant correlations\n\
             2. What these relationships might indicate\n\
             3. Any notable patterns"
        }
        AnalysisType::TTest => {
            "1. Whether groups differ significantly (p-value < 0.05)\n\
             2. Magnitude of the difference (effect size)\n\
             3. Practical significance of the finding"
        }
        AnalysisType::NormalityTest => {
            "1. Whether data is normally distributed (p-value >= 0.05)\n\
             2. Implications for further analysis\n\
             3. Recommendations if non-normal"
        }
    };
    let prompt = format!(
        "Interpret these statistical results:\n\n{}\n\n\
         Provide a concise interpretation (2-3 sentences) including:\n{}",
        result_json, asks,
    );

    let request = CompletionRequest::new(embedded::STATS, prompt)
        .with_options(&params.llm)
        .with_temperature(INTERPRET_TEMPERATURE);

    // Large budgets stream; the fragments are concatenated by the client
    let completion = if params.llm.max_tokens > STREAM_TOKEN_THRESHOLD {
        let (tx, mut rx) = tokio::sync::mpsc::channel(64);
        let drain = tokio::spawn(async move { while rx.recv().await.is_some() {} });
        let completion = ctx.llm.stream(request, tx).await?;
        let _ = drain.await;
        completion
    } else {
        ctx.llm.complete(request).await?
    };

    Ok(completion.content.trim().to_string())
}

fn render_heatmap(table: &Table, variables: &[String], ctx: &BlockContext) -> Option<String> {
    let renderer = ctx.renderer.as_ref()?;

    let mut values = Vec::new();
    let series: Vec<(&String, Vec<f64>)> = variables.iter().map(|v| (v, table.numeric_values(v))).collect();
    for (name_a, values_a) in &series {
        for (name_b, values_b) in &series {
            values.push(json!({"x": name_a, "y": name_b, "correlation": pearson(values_a, values_b)}));
        }
    }

    let spec = json!({
        "$schema": "https://vega.github.io/schema/vega-lite/v5.json",
        "width": 400,
        "height": 400,
        "title": "Correlation Matrix",
        "data": {"values": values},
        "mark": "rect",
        "encoding": {
            "x": {"field": "x", "type": "nominal"},
            "y": {"field": "y", "type": "nominal"},
            "color": {"field": "correlation", "type": "quantitative",
                      "scale": {"domain": [-1, 1], "scheme": "redblue"}},
        },
    });

    match renderer.render(&spec) {
        Ok(image) => Some(image),
        Err(e) => {
            warn!(error = %e, "Heatmap render failed");
            None
        }
    }
}

fn render_boxplot(table: &Table, dependent: &str, group_column: &str, ctx: &BlockContext) -> Option<String> {
    let renderer = ctx.renderer.as_ref()?;

    let values: Vec<Value> = table
        .rows
        .iter()
        .filter(|row| row.get(dependent).is_some_and(|v| as_f64(v).is_some()))
        .map(|row| {
            json!({
                "group": row.get(group_column).map(display_value).unwrap_or_default(),
                "value": row.get(dependent).and_then(as_f64),
            })
        })
        .collect();

    let spec = json!({
        "$schema": "https://vega.github.io/schema/vega-lite/v5.json",
        "width": 600,
        "height": 400,
        "title": format!("{} by {}", dependent, group_column),
        "data": {"values": values},
        "mark": {"type": "boxplot"},
        "encoding": {
            "x": {"field": "group", "type": "nominal", "title": group_column},
            "y": {"field": "value", "type": "quantitative", "title": dependent},
        },
    });

    match renderer.render(&spec) {
        Ok(image) => Some(image),
        Err(e) => {
            warn!(error = %e, "Box plot render failed");
            None
        }
    }
}

fn render_histogram(table: &Table, variable: &str, ctx: &BlockContext) -> Option<String> {
    let renderer = ctx.renderer.as_ref()?;

    let values: Vec<Value> = table.numeric_values(variable).into_iter().map(|v| json!({variable: v})).collect();
    let spec = json!({
        "$schema": "https://vega.github.io/schema/vega-lite/v5.json",
        "width": 600,
        "height": 400,
        "title": format!("Distribution of {}", variable),
        "data": {"values": values},
        "mark": "bar",
        "encoding": {
            "x": {"field": variable, "type": "quantitative", "bin": true},
            "y": {"aggregate": "count", "type": "quantitative", "title": "Density"},
        },
    });

    match renderer.render(&spec) {
        Ok(image) => Some(image),
        Err(e) => {
            warn!(error = %e, "Distribution render failed");
            None
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator)
fn sample_std(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64).sqrt()
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
    }
}

/// Pearson correlation coefficient over paired positions
fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let (mean_a, mean_b) = (mean(a), mean(b));
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..n {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a == 0.0 || var_b == 0.0 {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

/// Two-sided p-value for a t statistic via the regularized incomplete beta
fn student_t_two_sided_p(t: f64, df: f64) -> f64 {
    if df <= 0.0 {
        return 1.0;
    }
    let x = df / (df + t * t);
    incomplete_beta(df / 2.0, 0.5, x).clamp(0.0, 1.0)
}

/// Regularized incomplete beta function I_x(a, b)
fn incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_cf(a, b, x) / a
    } else {
        1.0 - front * beta_cf(b, a, 1.0 - x) / b
    }
}

/// Continued fraction for the incomplete beta (Lentz's method)
fn beta_cf(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 200;
    const EPS: f64 = 3e-14;
    const TINY: f64 = 1e-30;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < TINY {
        d = TINY;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < EPS {
            break;
        }
    }

    h
}

/// Lanczos approximation of ln(Gamma(x))
fn ln_gamma(x: f64) -> f64 {
    const COEFFS: [f64; 6] = [
        76.18009172947146,
        -86.50532032941677,
        24.01409824083091,
        -1.231739572450155,
        0.1208650973866179e-2,
        -0.5395239384953e-5,
    ];

    let mut y = x;
    let tmp = x + 5.5;
    let tmp = tmp - (x + 0.5) * tmp.ln();
    let mut series = 1.000000000190015;
    for coeff in COEFFS {
        y += 1.0;
        series += coeff / y;
    }
    -tmp + (2.5066282746310005 * series / x).ln()
}

/// Block wrapper for the registry
pub struct StatisticalAnalyzerBlock;

#[async_trait]
impl Block for StatisticalAnalyzerBlock {
    fn name(&self) -> &'static str {
        "statistical-analyzer"
    }

    fn description(&self) -> &'static str {
        "Perform statistical analysis with AI-powered interpretation"
    }

    async fn run(&self, inputs: Value, ctx: &BlockContext) -> Result<Value, BlockError> {
        let params: StatsParams = parse_params(inputs)?;
        analyze(&params, ctx).await
    }
}
