//! Standard error names carried by error replies

pub const FAILED: &str = "org.freedesktop.DBus.Error.Failed";
pub const NO_REPLY: &str = "org.freedesktop.DBus.Error.NoReply";
pub const SERVICE_UNKNOWN: &str = "org.freedesktop.DBus.Error.ServiceUnknown";
pub const NAME_HAS_NO_OWNER: &str = "org.freedesktop.DBus.Error.NameHasNoOwner";
pub const UNKNOWN_OBJECT: &str = "org.freedesktop.DBus.Error.UnknownObject";
pub const UNKNOWN_INTERFACE: &str = "org.freedesktop.DBus.Error.UnknownInterface";
pub const UNKNOWN_METHOD: &str = "org.freedesktop.DBus.Error.UnknownMethod";
pub const UNKNOWN_PROPERTY: &str = "org.freedesktop.DBus.Error.UnknownProperty";
pub const PROPERTY_READ_ONLY: &str = "org.freedesktop.DBus.Error.PropertyReadOnly";
pub const INVALID_ARGS: &str = "org.freedesktop.DBus.Error.InvalidArgs";
pub const MATCH_RULE_INVALID: &str = "org.freedesktop.DBus.Error.MatchRuleInvalid";
pub const MATCH_RULE_NOT_FOUND: &str = "org.freedesktop.DBus.Error.MatchRuleNotFound";
pub const LIMITS_EXCEEDED: &str = "org.freedesktop.DBus.Error.LimitsExceeded";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate_error_name;

    #[test]
    fn test_error_names_are_valid() {
        for name in [
            FAILED,
            NO_REPLY,
            SERVICE_UNKNOWN,
            NAME_HAS_NO_OWNER,
            UNKNOWN_OBJECT,
            UNKNOWN_INTERFACE,
            UNKNOWN_METHOD,
            UNKNOWN_PROPERTY,
            PROPERTY_READ_ONLY,
            INVALID_ARGS,
            MATCH_RULE_INVALID,
            MATCH_RULE_NOT_FOUND,
            LIMITS_EXCEEDED,
        ] {
            assert!(validate_error_name(name).is_ok(), "{}", name);
        }
    }
}
