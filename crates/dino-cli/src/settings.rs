//! Settings resolution: file (or defaults), then command-line overrides.

use std::path::Path;

use anyhow::Context;

use dino_core::{VoiceSettings, validate_settings};

use crate::commands::SayArgs;

/// Load settings from `path`, or defaults when no file is given.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<VoiceSettings> {
    match path {
        Some(path) => VoiceSettings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => Ok(VoiceSettings::default()),
    }
}

/// Apply `say` overrides and re-validate.
pub fn apply_overrides(mut settings: VoiceSettings, args: &SayArgs) -> anyhow::Result<VoiceSettings> {
    if let Some(profile) = args.profile {
        settings.profile = profile;
    }
    if let Some(speed) = args.speed {
        settings.speed = speed;
    }
    if let Some(url) = &args.backend_url {
        settings.backend_url = Some(url.clone());
    }

    validate_settings(&settings).context("Invalid settings")?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dino_core::EffectProfileKind;
    use std::io::Write;

    #[test]
    fn defaults_without_file() {
        let settings = load_settings(None).unwrap();
        assert_eq!(settings.profile, EffectProfileKind::Deep);
        assert!(settings.backend_url.is_none());
    }

    #[test]
    fn overrides_win_over_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"profile": "gentle", "speed": 0.75}}"#).unwrap();

        let loaded = load_settings(Some(file.path())).unwrap();
        assert_eq!(loaded.profile, EffectProfileKind::Gentle);

        let args = SayArgs {
            text: "Hi".to_string(),
            speed: Some(1.5),
            backend_url: Some("http://127.0.0.1:9880".to_string()),
            ..SayArgs::default()
        };
        let settings = apply_overrides(loaded, &args).unwrap();
        assert_eq!(settings.profile, EffectProfileKind::Gentle);
        assert!((settings.speed - 1.5).abs() < f32::EPSILON);
        assert_eq!(settings.backend_url.as_deref(), Some("http://127.0.0.1:9880"));
    }

    #[test]
    fn out_of_range_override_is_rejected() {
        let args = SayArgs {
            speed: Some(3.0),
            ..SayArgs::default()
        };
        assert!(apply_overrides(VoiceSettings::default(), &args).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_settings(Some(Path::new("/nonexistent/dino.json"))).is_err());
    }
}
