use std::env;

use crate::error::{ConfigError, Result};

/// Analysis-wide options. Threaded by reference into every component that
/// needs one; there is no ambient/global configuration.
#[derive(Clone, Copy, Debug, Default)]
pub struct Options {
    /// Forbid dynamically invoking builtins that access the calling frame by
    /// name. When set, an unresolved callee can no longer be assumed to
    /// reach the caller's locals, and the diagnostic intrinsic's
    /// dynamically-evaluated callback path is ruled out.
    pub disallow_dynamic_frame_access: bool,
}

impl Options {
    pub fn from_env() -> Result<Self> {
        let disallow_dynamic_frame_access =
            match env::var("TYPEFLUX_DISALLOW_DYNAMIC_FRAME_ACCESS") {
                Ok(raw) => match raw.trim() {
                    "" | "0" | "false" => false,
                    "1" | "true" => true,
                    other => {
                        return Err(ConfigError::InvalidValue {
                            name: "TYPEFLUX_DISALLOW_DYNAMIC_FRAME_ACCESS",
                            value: other.to_string(),
                            reason: "expected 0/1/true/false",
                        }
                        .into())
                    }
                },
                Err(_) => false,
            };
        Ok(Self {
            disallow_dynamic_frame_access,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_permissive() {
        let opts = Options::default();
        assert!(!opts.disallow_dynamic_frame_access);
    }
}
