//! Configuration validation.
//!
//! Only two settings are fatal: the key pair name must be set, and the
//! ingress address of the AD management instance must be set and be an IPv4
//! address or CIDR block. Everything else found by [`ConfigValidator::lint`]
//! is reported as a warning.

use crate::error::{ConfigError, RequiredField, Result, SynthError};
use std::net::Ipv4Addr;
use tracing::debug;

use super::settings::DeploymentConfig;

/// Minimum storage accepted by RDS for SQL Server Standard Edition.
const SQL_SERVER_MIN_STORAGE_GB: u32 = 20;

/// Validator for deployment configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result of a full check.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Required fields that are missing.
    pub missing: Vec<RequiredField>,
    /// Required fields that are set but malformed.
    pub invalid: Vec<ConfigError>,
    /// Non-fatal issues.
    pub warnings: Vec<String>,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Checks that every required field is set, in declaration order, and
    /// that the ingress address is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequired`] for the first missing field,
    /// or [`ConfigError::InvalidValue`] if the ingress address is not an IPv4
    /// address or CIDR block.
    pub fn check_required(&self, config: &DeploymentConfig) -> Result<()> {
        if let Some(field) = Self::missing_fields(config).first() {
            return Err(SynthError::Config(ConfigError::missing(*field)));
        }
        match Self::invalid_fields(config).into_iter().next() {
            Some(err) => Err(SynthError::Config(err)),
            None => Ok(()),
        }
    }

    /// Runs every check and collects the findings without failing.
    #[must_use]
    pub fn validate(&self, config: &DeploymentConfig) -> ValidationResult {
        ValidationResult {
            missing: Self::missing_fields(config),
            invalid: Self::invalid_fields(config),
            warnings: self.lint(config),
        }
    }

    /// Returns advisory warnings for a configuration.
    #[must_use]
    pub fn lint(&self, config: &DeploymentConfig) -> Vec<String> {
        let mut warnings = Vec::new();

        if !is_valid_name(&config.solution_id) {
            warnings.push(format!(
                "solution_id: '{}' should be lowercase alphanumeric with hyphens",
                config.solution_id
            ));
        }

        Self::lint_network(config, &mut warnings);
        Self::lint_directory(config, &mut warnings);
        Self::lint_capacity(config, &mut warnings);
        Self::lint_application(config, &mut warnings);

        debug!("Configuration lint produced {} warning(s)", warnings.len());
        warnings
    }

    fn missing_fields(config: &DeploymentConfig) -> Vec<RequiredField> {
        let mut missing = Vec::new();
        if config.ec2_instance_keypair_name.trim().is_empty() {
            missing.push(RequiredField::Ec2InstanceKeypairName);
        }
        if config.my_sg_ingress_ip.trim().is_empty() {
            missing.push(RequiredField::MySgIngressIp);
        }
        missing
    }

    fn invalid_fields(config: &DeploymentConfig) -> Vec<ConfigError> {
        let ip = config.my_sg_ingress_ip.trim();
        if ip.is_empty() || ingress_cidr(ip).is_some() {
            return Vec::new();
        }
        vec![ConfigError::invalid(
            RequiredField::MySgIngressIp.env_var(),
            ip,
            "expected an IPv4 address or CIDR block",
        )]
    }

    fn lint_network(config: &DeploymentConfig, warnings: &mut Vec<String>) {
        match parse_cidr(&config.vpc_cidr) {
            Some((_, prefix)) if !(16..=24).contains(&prefix) => warnings.push(format!(
                "vpc_cidr: prefix /{prefix} leaves no room for four /{} subnets",
                prefix.saturating_add(2)
            )),
            Some(_) => {}
            None => warnings.push(format!("vpc_cidr: '{}' is not an IPv4 CIDR", config.vpc_cidr)),
        }

        let ip = config.my_sg_ingress_ip.trim();
        if ip.is_empty() {
            return;
        }
        if ip.parse::<Ipv4Addr>().is_ok() {
            warnings.push(format!("my_sg_ingress_ip: '{ip}' has no prefix, /32 will be used"));
        } else if let Some((addr, 0)) = parse_cidr(ip) {
            if addr.is_unspecified() {
                warnings.push(String::from(
                    "my_sg_ingress_ip: 0.0.0.0/0 opens RDP on the AD management instance to the internet",
                ));
            }
        }
    }

    fn lint_directory(config: &DeploymentConfig, warnings: &mut Vec<String>) {
        let labels: Vec<&str> = config.ad_domain_name.split('.').collect();
        if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
            warnings.push(format!(
                "ad_domain_name: '{}' must be a fully qualified name such as corp.example.com",
                config.ad_domain_name
            ));
        }

        if config.gmsa_account_name.len() > 15 {
            warnings.push(format!(
                "gmsa_account_name: '{}' exceeds the 15 character sAMAccountName limit",
                config.gmsa_account_name
            ));
        }
    }

    fn lint_capacity(config: &DeploymentConfig, warnings: &mut Vec<String>) {
        if config.db_allocated_storage_gb < SQL_SERVER_MIN_STORAGE_GB {
            warnings.push(format!(
                "db_allocated_storage_gb: {} GiB is below the SQL Server minimum of {SQL_SERVER_MIN_STORAGE_GB} GiB",
                config.db_allocated_storage_gb
            ));
        }

        if config.ecs_desired_capacity == 0 {
            warnings.push(String::from(
                "ecs_desired_capacity: 0 container instances cannot run the application",
            ));
        }
    }

    fn lint_application(config: &DeploymentConfig, warnings: &mut Vec<String>) {
        match config.app_td_revision.as_deref() {
            Some(revision) if revision.parse::<u32>().map_or(true, |r| r == 0) => {
                warnings.push(format!(
                    "app_td_revision: '{revision}' is not a positive revision number"
                ));
            }
            None if config.deploy_app => warnings.push(String::from(
                "app_td_revision: not set, the service runs the task definition declared in this synthesis",
            )),
            _ => {}
        }
    }
}

/// Parses `a.b.c.d/nn` into its address and prefix length.
pub(crate) fn parse_cidr(cidr: &str) -> Option<(Ipv4Addr, u8)> {
    let (addr, prefix) = cidr.trim().split_once('/')?;
    let addr = addr.parse::<Ipv4Addr>().ok()?;
    let prefix = prefix.parse::<u8>().ok()?;
    (prefix <= 32).then_some((addr, prefix))
}

/// Normalizes an allow-listed address: a bare IPv4 address becomes a /32.
pub(crate) fn ingress_cidr(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let candidate = if raw.contains('/') {
        raw.to_string()
    } else {
        format!("{raw}/32")
    };
    parse_cidr(&candidate).map(|_| candidate)
}

/// Names must be lowercase alphanumeric with hyphens, starting with a letter.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }

    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return false;
    }

    !name.ends_with('-') && !name.contains("--")
}

impl ValidationResult {
    /// Returns true if no required field is missing or malformed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> DeploymentConfig {
        DeploymentConfig {
            ec2_instance_keypair_name: String::from("kp-1"),
            my_sg_ingress_ip: String::from("203.0.113.5/32"),
            ..DeploymentConfig::default()
        }
    }

    #[test]
    fn test_required_ok() {
        assert!(ConfigValidator::new().check_required(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_keypair_reported_first() {
        let config = DeploymentConfig::default();
        let err = ConfigValidator::new().check_required(&config).unwrap_err();
        assert_eq!(err.missing_field(), Some(RequiredField::Ec2InstanceKeypairName));

        let result = ConfigValidator::new().validate(&config);
        assert_eq!(
            result.missing,
            vec![RequiredField::Ec2InstanceKeypairName, RequiredField::MySgIngressIp]
        );
        assert!(!result.is_valid());
    }

    #[test]
    fn test_whitespace_ip_is_missing() {
        let config = DeploymentConfig {
            my_sg_ingress_ip: String::from("   "),
            ..valid_config()
        };
        let err = ConfigValidator::new().check_required(&config).unwrap_err();
        assert_eq!(err.missing_field(), Some(RequiredField::MySgIngressIp));
    }

    #[test]
    fn test_malformed_ip_is_fatal() {
        let config = DeploymentConfig {
            my_sg_ingress_ip: String::from("my-office"),
            ..valid_config()
        };
        let err = ConfigValidator::new().check_required(&config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid value for MY_SG_INGRESS_IP: 'my-office' (expected an IPv4 address or CIDR block)"
        );

        let result = ConfigValidator::new().validate(&config);
        assert!(!result.is_valid());
        assert!(result.missing.is_empty());
        assert_eq!(result.invalid.len(), 1);
        assert!(result.warnings.iter().all(|w| !w.starts_with("my_sg_ingress_ip")));
    }

    #[test]
    fn test_missing_reported_before_malformed() {
        let config = DeploymentConfig {
            ec2_instance_keypair_name: String::new(),
            my_sg_ingress_ip: String::from("my-office"),
            ..valid_config()
        };
        let err = ConfigValidator::new().check_required(&config).unwrap_err();
        assert_eq!(err.missing_field(), Some(RequiredField::Ec2InstanceKeypairName));
    }

    #[test]
    fn test_ingress_cidr() {
        assert_eq!(ingress_cidr("198.51.100.7").as_deref(), Some("198.51.100.7/32"));
        assert_eq!(ingress_cidr(" 10.1.0.0/16 ").as_deref(), Some("10.1.0.0/16"));
        assert_eq!(ingress_cidr("my-office"), None);
        assert_eq!(ingress_cidr("10.0.0.0/40"), None);
    }

    #[test]
    fn test_lint_short_domain_name() {
        let config = DeploymentConfig {
            ad_domain_name: String::from("corp"),
            ..valid_config()
        };
        let warnings = ConfigValidator::new().lint(&config);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("ad_domain_name: 'corp' must be a fully qualified name"));
    }

    #[test]
    fn test_lint_long_gmsa_account_name() {
        let config = DeploymentConfig {
            gmsa_account_name: String::from("webappgmsaaccount"),
            ..valid_config()
        };
        let warnings = ConfigValidator::new().lint(&config);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("gmsa_account_name: 'webappgmsaaccount' exceeds the 15 character"));
    }

    #[test]
    fn test_lint_small_storage() {
        let config = DeploymentConfig {
            db_allocated_storage_gb: 10,
            ..valid_config()
        };
        let warnings = ConfigValidator::new().lint(&config);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("db_allocated_storage_gb: 10 GiB is below the SQL Server minimum"));
    }

    #[test]
    fn test_lint_zero_capacity() {
        let config = DeploymentConfig {
            ecs_desired_capacity: 0,
            ..valid_config()
        };
        let warnings = ConfigValidator::new().lint(&config);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("ecs_desired_capacity: 0 container instances"));
    }

    #[test]
    fn test_lint_clean_config() {
        assert!(ConfigValidator::new().lint(&valid_config()).is_empty());
    }

    #[test]
    fn test_lint_open_ingress() {
        let config = DeploymentConfig {
            my_sg_ingress_ip: String::from("0.0.0.0/0"),
            ..valid_config()
        };
        let warnings = ConfigValidator::new().lint(&config);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("internet"));
    }

    #[test]
    fn test_lint_bare_ip_and_bad_cidr() {
        let config = DeploymentConfig {
            my_sg_ingress_ip: String::from("203.0.113.5"),
            vpc_cidr: String::from("10.0.0.0/28"),
            ..valid_config()
        };
        let warnings = ConfigValidator::new().lint(&config);
        assert!(warnings.iter().any(|w| w.contains("/32 will be used")));
        assert!(warnings.iter().any(|w| w.starts_with("vpc_cidr")));
    }

    #[test]
    fn test_lint_revision() {
        let config = DeploymentConfig {
            deploy_app: true,
            ..valid_config()
        };
        assert_eq!(ConfigValidator::new().lint(&config).len(), 1);

        let config = DeploymentConfig {
            app_td_revision: Some(String::from("abc")),
            ..valid_config()
        };
        assert!(ConfigValidator::new().lint(&config)[0].contains("'abc'"));
    }

    #[test]
    fn test_parse_cidr() {
        assert_eq!(parse_cidr("10.0.0.0/16"), Some((Ipv4Addr::new(10, 0, 0, 0), 16)));
        assert_eq!(parse_cidr("10.0.0.0/33"), None);
        assert_eq!(parse_cidr("10.0.0.0"), None);
        assert_eq!(parse_cidr("not-a-cidr/8"), None);
    }

    #[test]
    fn test_valid_name() {
        assert!(is_valid_name("sql-server-gmsa"));
        assert!(is_valid_name("a1"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("Upper"));
        assert!(!is_valid_name("1abc"));
        assert!(!is_valid_name("trailing-"));
        assert!(!is_valid_name("double--hyphen"));
    }
}
