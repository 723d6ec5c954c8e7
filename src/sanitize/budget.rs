use std::collections::HashMap;
use std::sync::RwLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::core::config::BudgetConfig;
use crate::core::row::{self, Row};

/// Budgets confirmed against signed contract documents. The model restates
/// these 10x too large often enough that they are pinned here.
const VERIFIED_BUDGETS: &[(&str, f64)] = &[
    (
        "Construction of a Maternity Block and 1no. Staff house at Liwera Health Centre",
        195_000_000.00,
    ),
    (
        "Construction of a Maternity Block and 1no. Staff house at Beni Health Centre",
        195_000_000.00,
    ),
    (
        "Completion of Chinkombero maternity wing and dispensary",
        120_000_000.00,
    ),
];

/// Detects and corrects order-of-magnitude inflation in currency figures
/// before they reach a user.
///
/// Correction is best-effort and total: the reference table wins for named
/// projects, an over-the-ceiling figure is divided by the configured factor,
/// and anything unparseable passes through unchanged with a diagnostic.
pub struct BudgetCorrector {
    known: RwLock<HashMap<String, f64>>,
    config: BudgetConfig,
    figure: Regex,
}

impl BudgetCorrector {
    pub fn new() -> Self {
        Self::with_config(BudgetConfig::default())
    }

    pub fn with_config(config: BudgetConfig) -> Self {
        let known = VERIFIED_BUDGETS
            .iter()
            .map(|(name, amount)| (name.to_string(), *amount))
            .collect();
        let figure = Regex::new(r"MWK\s+([\d,]+(?:\.\d+)?)").expect("figure pattern");
        Self {
            known: RwLock::new(known),
            config,
            figure,
        }
    }

    /// Adds or overrides a verified budget at runtime. From then on the entry
    /// takes precedence over the magnitude heuristic for that project.
    pub fn set_known(&self, project: &str, amount: f64) {
        self.known_mut().insert(project.to_string(), amount);
    }

    pub fn known_budget(&self, project: &str) -> Option<f64> {
        self.known().get(project).copied()
    }

    /// Corrects every currency figure in a free-text response.
    pub fn correct_text(&self, text: &str) -> String {
        // Unrelated responses pass through untouched.
        if !text.contains("MWK") && !text.to_lowercase().contains("budget") {
            return text.to_string();
        }
        let corrected = self.correct_known_projects(text);
        self.correct_magnitudes(&corrected)
    }

    /// Row/value path: the reference table wins for a named project, the
    /// heuristic applies otherwise.
    pub fn correct_value(&self, project: &str, amount: f64) -> f64 {
        match self.known_budget(project) {
            Some(verified) => verified,
            None => self.fix_magnitude(amount),
        }
    }

    /// Corrects every budget-like column of executed result rows in place.
    pub fn correct_rows(&self, rows: &mut [Row]) {
        for entry in rows.iter_mut() {
            let project = row::get_str(entry, "projectname").map(str::to_string);
            let budget_keys: Vec<String> = entry
                .keys()
                .filter(|key| key.to_lowercase().contains("budget"))
                .cloned()
                .collect();
            for key in budget_keys {
                let Some(amount) = entry.get(&key).and_then(row::value_as_f64) else {
                    continue;
                };
                let fixed = match &project {
                    Some(name) => self.correct_value(name, amount),
                    None => self.fix_magnitude(amount),
                };
                if (fixed - amount).abs() > f64::EPSILON {
                    debug!(column = %key, from = amount, to = fixed, "corrected row budget");
                    if let Some(number) = serde_json::Number::from_f64(fixed) {
                        entry.insert(key.clone(), serde_json::Value::Number(number));
                    }
                }
            }
        }
    }

    /// A figure above the plausible ceiling for a single project budget is
    /// off by the configured power-of-ten factor.
    pub fn fix_magnitude(&self, amount: f64) -> f64 {
        if amount.is_finite() && amount > self.config.plausible_max {
            amount / self.config.magnitude_factor
        } else {
            amount
        }
    }

    fn correct_known_projects(&self, text: &str) -> String {
        let known = self.known();
        let mut out = text.to_string();
        for (project, verified) in known.iter() {
            if !out.contains(project.as_str()) {
                continue;
            }
            for pattern in [
                // "<project> ... MWK 1,950,000,000.00"
                format!(
                    r"(?s){}.*?MWK\s+([\d,]+(?:\.\d+)?)",
                    regex::escape(project)
                ),
                // "<project> ... budget of 1,950,000,000.00" (no marker)
                format!(
                    r"(?si){}.*?(?:budget|allocated)\s+(?:of|is)?\s*([\d,]+(?:\.\d+)?)",
                    regex::escape(project)
                ),
            ] {
                let re = match Regex::new(&pattern) {
                    Ok(re) => re,
                    Err(err) => {
                        warn!(%err, project = %project, "skipping known-budget pattern");
                        continue;
                    }
                };
                let target = re.captures(&out).and_then(|caps| {
                    caps.get(1)
                        .map(|m| (m.range(), m.as_str().to_string()))
                });
                if let Some((range, quoted)) = target {
                    let replacement = format_amount(*verified);
                    if quoted != replacement {
                        debug!(
                            project = %project,
                            from = %quoted,
                            to = %replacement,
                            "replaced known project budget"
                        );
                        out.replace_range(range, &replacement);
                    }
                }
            }
        }
        out
    }

    fn correct_magnitudes(&self, text: &str) -> String {
        self.figure
            .replace_all(text, |caps: &regex::Captures| {
                let raw = &caps[1];
                let amount: f64 = match raw.replace(',', "").parse() {
                    Ok(value) => value,
                    Err(err) => {
                        warn!(%err, raw, "unparseable currency figure left unchanged");
                        return caps[0].to_string();
                    }
                };
                let fixed = self.fix_magnitude(amount);
                if (fixed - amount).abs() < f64::EPSILON {
                    caps[0].to_string()
                } else {
                    debug!(from = amount, to = fixed, "corrected budget magnitude");
                    format!("MWK {}", format_amount(fixed))
                }
            })
            .into_owned()
    }

    fn known(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, f64>> {
        self.known.read().unwrap_or_else(|e| e.into_inner())
    }

    fn known_mut(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, f64>> {
        self.known.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for BudgetCorrector {
    fn default() -> Self {
        Self::new()
    }
}

/// Thousands-separated with exactly two decimals: `1304462523.69` ->
/// `"1,304,462,523.69"`.
pub fn format_amount(amount: f64) -> String {
    let negative = amount.is_sign_negative() && amount != 0.0;
    let rendered = format!("{:.2}", amount.abs());
    let (int_part, frac_part) = rendered.split_once('.').unwrap_or((&rendered, "00"));
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if negative { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}

pub fn format_mwk(amount: f64) -> String {
    format!("MWK {}", format_amount(amount))
}
