//! `voltrag config` — Print the default configuration.

use voltrag_config::AppConfig;

pub fn run() {
    println!(
        "# {}",
        AppConfig::config_dir().join("config.toml").display()
    );
    println!("{}", AppConfig::default_toml());
}

#[cfg(test)]
mod tests {
    #[test]
    fn config_path_is_valid() {
        let path = voltrag_config::AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains(".voltrag"));
    }

    #[test]
    fn default_toml_has_every_section() {
        let text = voltrag_config::AppConfig::default_toml();
        for section in ["[retrieval]", "[memory]", "[context]", "[generation]", "[embedding]"] {
            assert!(text.contains(section), "{section}");
        }
    }
}
