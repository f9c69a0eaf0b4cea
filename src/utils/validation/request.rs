//! Request shape validation
//!
//! [`RequestValidator::validate`] runs before any I/O: malformed identifiers
//! and oversized prompts never reach the repository, ledger or network.
//! Whether the mode argument is present is settled by
//! [`ValidatedRequest::source`] once the image itself has been checked.

use crate::{
    config::MAX_PROMPT_CHARS,
    error::{ComposeError, Result},
    types::{ApplyBackgroundRequest, BackgroundSource, Mode},
};
use uuid::Uuid;

/// Identifiers and mode arguments of a well-formed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub image_id: Uuid,
    pub user_id: Uuid,
    pub mode: Mode,
    pub background_id: Option<String>,
    pub prompt: Option<String>,
}

impl ValidatedRequest {
    /// Resolve the mode arguments into exactly one background source
    pub fn source(&self) -> Result<BackgroundSource> {
        RequestValidator::validate_source(
            self.mode,
            self.background_id.as_deref(),
            self.prompt.as_deref(),
        )
    }
}

/// Validator for incoming apply-background requests
pub struct RequestValidator;

impl RequestValidator {
    /// Parse an identifier, rejecting anything that is not a UUID
    pub fn validate_id(value: &str, name: &str) -> Result<Uuid> {
        Uuid::parse_str(value.trim())
            .map_err(|_| ComposeError::validation(format!("Wrong id: {} '{}'", name, value)))
    }

    /// Validate a prompt for a generated background
    pub fn validate_prompt(prompt: &str) -> Result<String> {
        let trimmed = prompt.trim();
        if trimmed.is_empty() {
            return Err(ComposeError::validation(
                "prompt is required for generate mode",
            ));
        }

        Self::validate_prompt_length(trimmed)?;
        Ok(trimmed.to_string())
    }

    /// Resolve the mode arguments into exactly one background source
    pub fn validate_source(
        mode: Mode,
        background_id: Option<&str>,
        prompt: Option<&str>,
    ) -> Result<BackgroundSource> {
        match mode {
            Mode::Preset => {
                let id = background_id
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| {
                        ComposeError::validation("backgroundId is required for preset mode")
                    })?;
                Ok(BackgroundSource::Preset { id: id.to_string() })
            },
            Mode::Generate => {
                let prompt = prompt.ok_or_else(|| {
                    ComposeError::validation("prompt is required for generate mode")
                })?;
                Ok(BackgroundSource::Generated {
                    prompt: Self::validate_prompt(prompt)?,
                })
            },
        }
    }

    /// Reject a prompt over the length limit; blank or absent prompts pass
    pub fn validate_prompt_length(prompt: &str) -> Result<()> {
        let length = prompt.trim().chars().count();
        if length > MAX_PROMPT_CHARS {
            return Err(ComposeError::validation(format!(
                "Prompt too long: {} characters (maximum {})",
                length, MAX_PROMPT_CHARS
            )));
        }
        Ok(())
    }

    /// Validate identifiers and argument shape
    pub fn validate(request: &ApplyBackgroundRequest) -> Result<ValidatedRequest> {
        let user_id = Self::validate_id(&request.user_id, "user id")?;
        let image_id = Self::validate_id(&request.image_id, "image id")?;
        if request.mode == Mode::Generate {
            if let Some(prompt) = request.prompt.as_deref() {
                Self::validate_prompt_length(prompt)?;
            }
        }

        Ok(ValidatedRequest {
            image_id,
            user_id,
            mode: request.mode,
            background_id: request.background_id.clone(),
            prompt: request.prompt.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IMAGE: &str = "0b8f8c1e-6d43-4a53-9d4e-3f1f0c7a2b11";
    const USER: &str = "5f0d8a2c-1e7b-4c39-8f5a-9b2d6e4c1a07";

    #[test]
    fn test_validate_id() {
        assert!(RequestValidator::validate_id(IMAGE, "image id").is_ok());
        let err = RequestValidator::validate_id("42", "image id").unwrap_err();
        assert!(matches!(err, ComposeError::Validation(_)));
        assert!(err.to_string().contains("Wrong id"));
    }

    #[test]
    fn test_prompt_length_limit_counts_characters() {
        let at_limit = "é".repeat(MAX_PROMPT_CHARS);
        assert!(RequestValidator::validate_prompt(&at_limit).is_ok());

        let over = "a".repeat(MAX_PROMPT_CHARS + 1);
        let err = RequestValidator::validate_prompt(&over).unwrap_err();
        assert!(err.to_string().contains("Prompt too long"));

        assert!(RequestValidator::validate_prompt("   ").is_err());
    }

    #[test]
    fn test_preset_requires_background_id() {
        let request = ApplyBackgroundRequest {
            image_id: IMAGE.to_string(),
            user_id: USER.to_string(),
            mode: Mode::Preset,
            background_id: None,
            prompt: Some("ignored".to_string()),
        };
        let validated = RequestValidator::validate(&request).unwrap();
        let err = validated.source().unwrap_err();
        assert!(err.to_string().contains("backgroundId is required"));
    }

    #[test]
    fn test_generate_requires_prompt() {
        let request = ApplyBackgroundRequest {
            image_id: IMAGE.to_string(),
            user_id: USER.to_string(),
            mode: Mode::Generate,
            background_id: Some("studio-soft".to_string()),
            prompt: None,
        };
        let err = RequestValidator::validate(&request)
            .and_then(|validated| validated.source())
            .unwrap_err();
        assert!(err.to_string().contains("prompt is required"));
    }

    #[test]
    fn test_valid_generate_request() {
        let request = ApplyBackgroundRequest::generate(IMAGE, USER, "  cozy office ");
        let validated = RequestValidator::validate(&request).unwrap();
        assert_eq!(validated.image_id.to_string(), IMAGE);
        assert_eq!(
            validated.source().unwrap(),
            BackgroundSource::Generated {
                prompt: "cozy office".to_string()
            }
        );
    }

    #[test]
    fn test_oversized_prompt_rejected_up_front() {
        let request = ApplyBackgroundRequest::generate(IMAGE, USER, "a".repeat(MAX_PROMPT_CHARS + 1));
        let err = RequestValidator::validate(&request).unwrap_err();
        assert!(err.to_string().contains("Prompt too long"));

        // Presence is only checked when the source is resolved
        let blank = ApplyBackgroundRequest::generate(IMAGE, USER, "   ");
        let validated = RequestValidator::validate(&blank).unwrap();
        assert!(matches!(validated.source(), Err(ComposeError::Validation(_))));
    }
}
