//! Derivation hooks: fill unset settings from other settings.
//!
//! A hook names the key it populates and a pure function computing the
//! value from the settings seen so far. Hooks run in order, so a hook can
//! rely on keys derived by earlier ones.

use std::fmt;

use log::{debug, warn};

use super::config::DeviceSettings;
use crate::error::ConfigError;

/// A settings key a hook can populate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Id,
    Address,
    Username,
    Prompt,
    EnabledPrompt,
    UsernamePrompt,
    PasswordPrompt,
    EnablePasswordPrompt,
    EnableCommand,
    LogoutCommand,
    DisablePagingCommand,
    LineTerminator,
    /// An entry of the named pattern registry.
    Pattern(String),
}

impl Field {
    /// The settings key name.
    pub fn name(&self) -> &str {
        match self {
            Field::Id => "id",
            Field::Address => "address",
            Field::Username => "username",
            Field::Prompt => "prompt",
            Field::EnabledPrompt => "enabled_prompt",
            Field::UsernamePrompt => "username_prompt",
            Field::PasswordPrompt => "password_prompt",
            Field::EnablePasswordPrompt => "enable_password_prompt",
            Field::EnableCommand => "enable_command",
            Field::LogoutCommand => "logout_command",
            Field::DisablePagingCommand => "disable_paging_command",
            Field::LineTerminator => "line_terminator",
            Field::Pattern(name) => name,
        }
    }

    fn slot<'a>(&self, settings: &'a mut DeviceSettings) -> Option<&'a mut Option<String>> {
        Some(match self {
            Field::Id => &mut settings.id,
            Field::Address => &mut settings.address,
            Field::Username => &mut settings.username,
            Field::Prompt => &mut settings.prompt,
            Field::EnabledPrompt => &mut settings.enabled_prompt,
            Field::UsernamePrompt => &mut settings.username_prompt,
            Field::PasswordPrompt => &mut settings.password_prompt,
            Field::EnablePasswordPrompt => &mut settings.enable_password_prompt,
            Field::EnableCommand => &mut settings.enable_command,
            Field::LogoutCommand => &mut settings.logout_command,
            Field::DisablePagingCommand => &mut settings.disable_paging_command,
            Field::LineTerminator => &mut settings.line_terminator,
            Field::Pattern(_) => return None,
        })
    }

    /// The current value of this key in `settings`.
    pub fn value<'a>(&self, settings: &'a DeviceSettings) -> Option<&'a str> {
        match self {
            Field::Id => settings.id.as_deref(),
            Field::Address => settings.address.as_deref(),
            Field::Username => settings.username.as_deref(),
            Field::Prompt => settings.prompt.as_deref(),
            Field::EnabledPrompt => settings.enabled_prompt.as_deref(),
            Field::UsernamePrompt => settings.username_prompt.as_deref(),
            Field::PasswordPrompt => settings.password_prompt.as_deref(),
            Field::EnablePasswordPrompt => settings.enable_password_prompt.as_deref(),
            Field::EnableCommand => settings.enable_command.as_deref(),
            Field::LogoutCommand => settings.logout_command.as_deref(),
            Field::DisablePagingCommand => settings.disable_paging_command.as_deref(),
            Field::LineTerminator => settings.line_terminator.as_deref(),
            Field::Pattern(name) => settings.patterns.get(name).map(String::as_str),
        }
    }

    /// Whether `settings` already has a value for this key.
    pub fn is_set(&self, settings: &DeviceSettings) -> bool {
        self.value(settings).is_some()
    }

    /// Store `value` for this key.
    pub fn set(&self, settings: &mut DeviceSettings, value: String) {
        match self {
            Field::Pattern(name) => {
                settings.patterns.insert(name.clone(), value);
            }
            _ => {
                if let Some(slot) = self.slot(settings) {
                    *slot = Some(value);
                }
            }
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Computes a value from the settings, or explains why it cannot.
pub type Derive = fn(&DeviceSettings) -> Result<String, ConfigError>;

/// A derivation hook.
#[derive(Clone)]
pub struct Hook {
    /// The key populated by this hook.
    pub field: Field,
    /// The derivation.
    pub derive: Derive,
}

impl Hook {
    /// Create a hook.
    pub fn new(field: Field, derive: Derive) -> Self {
        Self { field, derive }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook").field("field", &self.field).finish()
    }
}

/// How [`process_hooks`] treats set keys and failing hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookPolicy {
    /// Run hooks even for keys that already have a value.
    pub force: bool,
    /// Abort on the first failing hook; otherwise log and continue.
    pub strict: bool,
}

impl Default for HookPolicy {
    fn default() -> Self {
        Self {
            force: false,
            strict: true,
        }
    }
}

/// Apply `hooks` to `settings` in order.
pub fn process_hooks(
    settings: &mut DeviceSettings,
    hooks: &[Hook],
    policy: HookPolicy,
) -> Result<(), ConfigError> {
    for hook in hooks {
        if !policy.force && hook.field.is_set(settings) {
            continue;
        }
        match (hook.derive)(settings) {
            Ok(value) => {
                debug!("derived '{}' = {:?}", hook.field, value);
                hook.field.set(settings, value);
            }
            Err(e) => {
                warn!("hook for '{}' failed: {}", hook.field, e);
                if policy.strict {
                    return Err(e);
                }
            }
        }
    }
    Ok(())
}

fn id_for<'a>(settings: &'a DeviceSettings, field: &str) -> Result<&'a str, ConfigError> {
    settings
        .id
        .as_deref()
        .ok_or_else(|| ConfigError::ImproperlyConfigured {
            field: field.to_string(),
            message: "'id' is not set".to_string(),
        })
}

/// `prompt` from the device id: `<id>>`.
pub fn prompt_from_id() -> Hook {
    Hook::new(Field::Prompt, |settings| {
        let id = id_for(settings, "prompt")?;
        Ok(format!("{}>", regex::escape(id)))
    })
}

/// `enabled_prompt` from the device id: `<id>#`, also matching
/// configuration sub-modes such as `<id>(config-if)#`.
pub fn enabled_prompt_from_id() -> Hook {
    Hook::new(Field::EnabledPrompt, |settings| {
        let id = id_for(settings, "enabled_prompt")?;
        Ok(format!(r"{}(?:\([\w.\-]+\))?#", regex::escape(id)))
    })
}

/// `prompt` matching any host name.
pub fn generic_prompt() -> Hook {
    Hook::new(Field::Prompt, |_| Ok(r"[\w.\-]+>".to_string()))
}

/// `enabled_prompt` matching any host name and configuration sub-mode.
pub fn generic_enabled_prompt() -> Hook {
    Hook::new(Field::EnabledPrompt, |_| {
        Ok(r"[\w.\-]+(?:\([\w.\-]+\))?#".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fail(_: &DeviceSettings) -> Result<String, ConfigError> {
        Err(ConfigError::ImproperlyConfigured {
            field: "username".to_string(),
            message: "no directory".to_string(),
        })
    }

    #[test]
    fn test_hooks_fill_unset_fields_only() {
        let mut settings = DeviceSettings::new().id("sw1").prompt("custom>");
        process_hooks(
            &mut settings,
            &[prompt_from_id(), enabled_prompt_from_id()],
            HookPolicy::default(),
        )
        .unwrap();

        assert_eq!(settings.prompt.as_deref(), Some("custom>"));
        assert_eq!(
            settings.enabled_prompt.as_deref(),
            Some(r"sw1(?:\([\w.\-]+\))?#")
        );
    }

    #[test]
    fn test_force_overwrites() {
        let mut settings = DeviceSettings::new().id("sw1").prompt("custom>");
        let policy = HookPolicy {
            force: true,
            ..Default::default()
        };
        process_hooks(&mut settings, &[prompt_from_id()], policy).unwrap();
        assert_eq!(settings.prompt.as_deref(), Some("sw1>"));
    }

    #[test]
    fn test_later_hooks_see_earlier_results() {
        let mut settings = DeviceSettings::new().address("r1.example.net");
        let hooks = [
            Hook::new(Field::Id, |s| {
                let address = s.address.as_deref().unwrap_or_default();
                Ok(address.split('.').next().unwrap_or_default().to_string())
            }),
            prompt_from_id(),
        ];
        process_hooks(&mut settings, &hooks, HookPolicy::default()).unwrap();
        assert_eq!(settings.id.as_deref(), Some("r1"));
        assert_eq!(settings.prompt.as_deref(), Some("r1>"));
    }

    #[test]
    fn test_strict_failure_aborts() {
        let mut settings = DeviceSettings::new();
        let hooks = [Hook::new(Field::Username, fail), generic_prompt()];
        let err = process_hooks(&mut settings, &hooks, HookPolicy::default()).unwrap_err();
        assert!(matches!(err, ConfigError::ImproperlyConfigured { ref field, .. } if field == "username"));
        assert!(settings.prompt.is_none());
    }

    #[test]
    fn test_lenient_failure_continues() {
        let mut settings = DeviceSettings::new();
        let hooks = [Hook::new(Field::Username, fail), generic_prompt()];
        let policy = HookPolicy {
            strict: false,
            ..Default::default()
        };
        process_hooks(&mut settings, &hooks, policy).unwrap();
        assert!(settings.username.is_none());
        assert_eq!(settings.prompt.as_deref(), Some(r"[\w.\-]+>"));
    }

    #[test]
    fn test_pattern_registry_field() {
        let mut settings = DeviceSettings::new();
        let field = Field::Pattern("confirm".to_string());
        assert!(!field.is_set(&settings));

        process_hooks(
            &mut settings,
            &[Hook::new(field.clone(), |_| Ok(r"\[confirm\]".to_string()))],
            HookPolicy::default(),
        )
        .unwrap();
        assert!(field.is_set(&settings));
        assert_eq!(field.to_string(), "confirm");
    }

    #[test]
    fn test_id_is_escaped() {
        let mut settings = DeviceSettings::new().id("edge.1");
        process_hooks(&mut settings, &[prompt_from_id()], HookPolicy::default()).unwrap();
        assert_eq!(settings.prompt.as_deref(), Some(r"edge\.1>"));
    }
}
