//! Conversion of CLI arguments into compose inputs

use crate::cli::main_impl::ComposeArgs;
use crate::{
    catalog::BackgroundCatalog,
    config::{ComposeOverrides, ComposeParameters},
};
use anyhow::{Context, Result};

/// Convert CLI arguments to compose parameters
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Overrides given explicitly on the command line
    pub(crate) fn overrides(args: &ComposeArgs) -> ComposeOverrides {
        ComposeOverrides {
            scale: args.scale,
            bg_blur: args.bg_blur,
            saturation: args.saturation,
            brightness: args.brightness,
            add_shadow: args.no_shadow.then_some(false),
            shadow_offset_x: args.shadow_offset_x,
            shadow_offset_y: args.shadow_offset_y,
            shadow_blur: args.shadow_blur,
            bottom_margin: args.bottom_margin,
        }
    }

    /// Background URL and effective parameters
    ///
    /// A background matching a preset id uses the preset's image and
    /// overrides; flags given on the command line win over both.
    pub(crate) fn resolve_background(
        args: &ComposeArgs,
        catalog: &BackgroundCatalog,
    ) -> Result<(String, ComposeParameters)> {
        let defaults = ComposeParameters::default();
        let (url, base) = match catalog.by_id(&args.background) {
            Some(preset) => (preset.image_url.clone(), preset.parameters(&defaults)),
            None => (args.background.clone(), defaults),
        };

        let params = base.with_overrides(&Self::overrides(args));
        params.validate().context("Invalid compose parameters")?;
        Ok((url, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_args(background: &str) -> ComposeArgs {
        ComposeArgs {
            subject: "cutout.png".to_string(),
            background: background.to_string(),
            output: "out.png".to_string(),
            scale: None,
            bg_blur: None,
            saturation: None,
            brightness: None,
            no_shadow: false,
            shadow_offset_x: None,
            shadow_offset_y: None,
            shadow_blur: None,
            bottom_margin: None,
            timeout: 30,
        }
    }

    #[test]
    fn test_plain_background_uses_defaults() {
        let catalog = BackgroundCatalog::builtin();
        let (url, params) =
            CliConfigBuilder::resolve_background(&create_test_args("bg.jpg"), &catalog).unwrap();
        assert_eq!(url, "bg.jpg");
        assert_eq!(params, ComposeParameters::default());
    }

    #[test]
    fn test_preset_background_and_flag_precedence() {
        let catalog = BackgroundCatalog::builtin();
        let mut args = create_test_args("outdoor-city");
        args.scale = Some(0.4);
        args.no_shadow = true;

        let (url, params) = CliConfigBuilder::resolve_background(&args, &catalog).unwrap();
        assert!(url.ends_with("/outdoor-city.png"));
        assert!((params.bg_blur - 4.0).abs() < f32::EPSILON);
        assert!((params.scale - 0.4).abs() < f32::EPSILON);
        assert!(!params.add_shadow);

        args.bg_blur = Some(0.0);
        let (_, params) = CliConfigBuilder::resolve_background(&args, &catalog).unwrap();
        assert!(params.bg_blur.abs() < f32::EPSILON);
    }

    #[test]
    fn test_invalid_flags_rejected() {
        let catalog = BackgroundCatalog::builtin();
        let mut args = create_test_args("bg.jpg");
        args.scale = Some(1.5);
        assert!(CliConfigBuilder::resolve_background(&args, &catalog).is_err());
    }
}
