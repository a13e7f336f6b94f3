use std::path::PathBuf;

use chrono::{Local, NaiveDate};

use crate::dates::parse_date;
use crate::error::AppError;

pub const HOME_ENV: &str = "DAYPLAN_HOME";
pub const TODAY_ENV: &str = "DAYPLAN_TODAY";
pub const LOG_ENV: &str = "DAYPLAN_LOG";
const DEFAULT_DIR_NAME: &str = ".dayplan";

#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub today: NaiveDate,
}

impl Settings {
    /// Flags win over environment variables, which win over defaults.
    pub fn resolve(data_dir: Option<PathBuf>, date: Option<String>) -> Result<Self, AppError> {
        Self::resolve_with(data_dir, date, |key| std::env::var(key).ok(), Local::now().date_naive())
    }

    fn resolve_with(
        data_dir: Option<PathBuf>,
        date: Option<String>,
        env: impl Fn(&str) -> Option<String>,
        local_today: NaiveDate,
    ) -> Result<Self, AppError> {
        let data_dir = match data_dir.or_else(|| non_empty(env(HOME_ENV)).map(PathBuf::from)) {
            Some(dir) => dir,
            None => non_empty(env("HOME"))
                .map(|home| PathBuf::from(home).join(DEFAULT_DIR_NAME))
                .ok_or_else(|| {
                    AppError::Validation(format!(
                        "unable to resolve data directory; pass --data-dir or set {HOME_ENV}"
                    ))
                })?,
        };
        if data_dir.as_os_str().to_string_lossy().trim().is_empty() {
            return Err(AppError::Validation("--data-dir is empty".to_string()));
        }

        let today = match date.or_else(|| non_empty(env(TODAY_ENV))) {
            Some(value) => parse_date(&value)?,
            None => local_today,
        };

        Ok(Self { data_dir, today })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
