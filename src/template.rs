//! Annotated example configuration.

/// An example config file covering every setting, with comments.
///
/// Printed by `backfill example-config` as a starting point.
#[must_use]
pub fn example_config() -> &'static str {
    include_str!("example.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFile;

    #[test]
    fn example_config_is_valid() {
        let config = ConfigFile::from_toml(example_config())
            .unwrap()
            .validate()
            .unwrap();
        assert!(config.start <= config.end);
        assert!(config.message_source.is_some());
    }
}
