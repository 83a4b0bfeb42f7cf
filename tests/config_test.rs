use std::env;
use std::fs;
use tempfile::tempdir;

#[cfg(test)]
mod config_tests {
    use super::*;
    use llm_footprint::config::Config;
    use llm_footprint::forecast::{ForecastAnchor, ScenarioKey};
    use llm_footprint::timestamp_parser::DayBoundary;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();

        assert_eq!(config.logging.level, "ERROR");
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.logging.output, "console");

        assert_eq!(config.engine.carbon_intensity, None);
        assert_eq!(config.engine.selected_mix, "global_average");
        assert_eq!(config.engine.day_boundary, DayBoundary::Local);

        assert_eq!(config.forecast.horizon_days, 30);
        assert_eq!(config.forecast.scenario, "normal");
        assert_eq!(config.forecast.anchor, ForecastAnchor::Mean);

        assert!(config.output.json_pretty);
        assert_eq!(config.output.daily_limit, 30);
        assert_eq!(config.output.recent_limit, 4);
        assert!(config.paths.data_directory.ends_with("llm-footprint"));
    }

    #[test]
    fn test_env_variable_override() {
        env::set_var("LLM_FOOTPRINT_INTENSITY", "56");
        env::set_var("LLM_FOOTPRINT_SCENARIO", "intensive");
        env::set_var("LLM_FOOTPRINT_HORIZON_DAYS", "14");
        env::set_var("LLM_FOOTPRINT_DAY_BOUNDARY", "utc");

        let mut config = Config::default();
        config
            .apply_env_overrides()
            .expect("Failed to apply env overrides");

        assert_eq!(config.engine.carbon_intensity, Some(56.0));
        assert_eq!(config.scenario(), ScenarioKey::Intensive);
        assert_eq!(config.forecast.horizon_days, 14);
        assert_eq!(config.engine.day_boundary, DayBoundary::Utc);

        env::remove_var("LLM_FOOTPRINT_INTENSITY");
        env::remove_var("LLM_FOOTPRINT_SCENARIO");
        env::remove_var("LLM_FOOTPRINT_HORIZON_DAYS");
        env::remove_var("LLM_FOOTPRINT_DAY_BOUNDARY");
    }

    #[test]
    fn test_config_file_loading() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("llm-footprint.toml");

        let config_content = r#"
[logging]
level = "DEBUG"
format = "json"
output = "console"

[engine]
carbon_intensity = 120.0
selected_mix = "france"
day_boundary = "utc"

[forecast]
horizon_days = 90
scenario = "conservative"
anchor = "last"
"#;

        fs::write(&config_path, config_content).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();

        assert_eq!(config.logging.level, "DEBUG");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.engine.carbon_intensity, Some(120.0));
        assert_eq!(config.engine.selected_mix, "france");
        assert_eq!(config.engine.day_boundary, DayBoundary::Utc);
        assert_eq!(config.forecast.horizon_days, 90);
        assert_eq!(config.scenario(), ScenarioKey::Conservative);
        assert_eq!(config.forecast.anchor, ForecastAnchor::LastObserved);

        // sections absent from the file keep their defaults
        assert_eq!(config.output.recent_limit, 4);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.forecast.horizon_days = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.engine.carbon_intensity = Some(f64::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("saved.toml");

        let mut config = Config::default();
        config.engine.selected_mix = "norway".to_string();
        config.forecast.horizon_days = 45;
        config.save_to_file(&config_path).unwrap();

        let reloaded = Config::load_from_file(&config_path).unwrap();
        assert_eq!(reloaded.engine.selected_mix, "norway");
        assert_eq!(reloaded.forecast.horizon_days, 45);
    }
}
