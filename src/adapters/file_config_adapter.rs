//! INI file configuration adapter.

use configparser::ini::Ini;
use std::path::Path;

use crate::domain::error::EngineError;
use crate::ports::config_port::ConfigPort;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| EngineError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, EngineError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| EngineError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_deref()
            .and_then(Self::parse_bool)
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_sections() {
        let content = r#"
[engine]
instruments = AAPL, MSFT
lookback = 250

[signals]
buy = AND(CROSS_ABOVE(EMA_SHORT, EMA_LONG), BELOW(RSI, 70))

[risk]
atr_multiplier = 1.5
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("engine", "instruments"),
            Some("AAPL, MSFT".to_string())
        );
        assert_eq!(adapter.get_int("engine", "lookback", 0), 250);
        assert_eq!(adapter.get_double("risk", "atr_multiplier", 0.0), 1.5);
        assert_eq!(
            adapter.get_string("signals", "buy"),
            Some("AND(CROSS_ABOVE(EMA_SHORT, EMA_LONG), BELOW(RSI, 70))".to_string())
        );
    }

    #[test]
    fn missing_key_and_section() {
        let adapter = FileConfigAdapter::from_string("[engine]\nlookback = 100\n").unwrap();
        assert_eq!(adapter.get_string("engine", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
        assert_eq!(adapter.get_int("engine", "missing", 42), 42);
        assert_eq!(adapter.get_double("engine", "missing", 9.5), 9.5);
    }

    #[test]
    fn typed_getters_fall_back_on_garbage() {
        let adapter =
            FileConfigAdapter::from_string("[engine]\nlookback = abc\nquantity = x.y\n").unwrap();
        assert_eq!(adapter.get_int("engine", "lookback", 42), 42);
        assert_eq!(adapter.get_double("engine", "quantity", 1.0), 1.0);
    }

    #[test]
    fn bools() {
        let adapter = FileConfigAdapter::from_string(
            "[engine]\na = true\nb = yes\nc = 1\nd = false\ne = no\nf = 0\ng = maybe\n",
        )
        .unwrap();
        assert!(adapter.get_bool("engine", "a", false));
        assert!(adapter.get_bool("engine", "b", false));
        assert!(adapter.get_bool("engine", "c", false));
        assert!(!adapter.get_bool("engine", "d", true));
        assert!(!adapter.get_bool("engine", "e", true));
        assert!(!adapter.get_bool("engine", "f", true));
        assert!(adapter.get_bool("engine", "g", true));
        assert!(!adapter.get_bool("engine", "missing", false));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[options]\nexpiry = 2024-12-20\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("options", "expiry"),
            Some("2024-12-20".to_string())
        );
    }

    #[test]
    fn from_file_missing_is_config_parse_error() {
        let err = FileConfigAdapter::from_file("/nonexistent/path/config.ini")
            .err()
            .unwrap();
        assert!(
            matches!(err, EngineError::ConfigParse { ref file, .. } if file.contains("config.ini"))
        );
    }
}
