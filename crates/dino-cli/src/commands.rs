//! Subcommands.

use clap::{Args, Subcommand};

use dino_core::EffectProfileKind;

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Speak a line and wait until it finishes
    Say(SayArgs),

    /// List the platform voices and show which one the fallback would use
    Voices,
}

/// Overrides applied on top of the loaded settings for one utterance.
#[derive(Args, Debug, Default)]
pub struct SayArgs {
    /// Text to speak
    pub text: String,

    /// Effects profile: deep (dinosaur) or gentle (cloned)
    #[arg(short, long)]
    pub profile: Option<EffectProfileKind>,

    /// Base URL of the voice-cloning synthesis backend
    #[arg(long, env = "DINO_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Synthesis speed factor (0.5 to 2.0)
    #[arg(short, long)]
    pub speed: Option<f32>,

    /// Cancel anything the platform engine is still saying
    #[arg(short, long)]
    pub interrupt: bool,
}

#[cfg(test)]
mod tests {
    use crate::parser::Cli;
    use clap::Parser;

    use super::*;

    #[test]
    fn say_parses_overrides() {
        let cli = Cli::parse_from([
            "dino",
            "say",
            "Roar!",
            "--profile",
            "cloned",
            "--speed",
            "1.25",
            "--backend-url",
            "http://localhost:9880",
            "--interrupt",
        ]);
        let Commands::Say(args) = cli.command else {
            panic!("expected say");
        };
        assert_eq!(args.text, "Roar!");
        assert_eq!(args.profile, Some(EffectProfileKind::Gentle));
        assert_eq!(args.speed, Some(1.25));
        assert_eq!(args.backend_url.as_deref(), Some("http://localhost:9880"));
        assert!(args.interrupt);
    }

    #[test]
    fn say_rejects_unknown_profile() {
        let result = Cli::try_parse_from(["dino", "say", "hi", "--profile", "squeaky"]);
        assert!(result.is_err());
    }

    #[test]
    fn say_requires_text() {
        assert!(Cli::try_parse_from(["dino", "say"]).is_err());
    }
}
