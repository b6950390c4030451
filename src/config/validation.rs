//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Enforce catalog uniqueness (service names, listen ports, tenant ids)
//! - Validate backend lists and weights
//! - Check that URL rewrite patterns compile
//! - Check that the flow bucket time zone is representable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::service::{HttpMatchType, ServiceRule};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("duplicate service name {0:?}")]
    DuplicateService(String),

    #[error("port {port} is used by both {first:?} and {second:?}")]
    DuplicatePort {
        port: u16,
        first: String,
        second: String,
    },

    #[error("service {0:?} has an empty http rule")]
    EmptyHttpRule(String),

    #[error("service {0:?} has no backend addresses")]
    NoBackends(String),

    #[error("service {service:?} lists {weights} weights for {addresses} addresses")]
    WeightCountMismatch {
        service: String,
        addresses: usize,
        weights: usize,
    },

    #[error("service {0:?} has a zero weight")]
    ZeroWeight(String),

    #[error("service {service:?} has an invalid url rewrite pattern {pattern:?}")]
    InvalidRewrite { service: String, pattern: String },

    #[error("duplicate tenant id {0:?}")]
    DuplicateTenant(String),

    #[error("tenant has an empty app_id")]
    EmptyTenantId,

    #[error("flow utc_offset_hours {0} is out of range")]
    InvalidUtcOffset(i32),
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut names = HashSet::new();
    let mut ports: HashMap<u16, &str> = HashMap::new();

    for service in &config.services {
        if !names.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateService(service.name.clone()));
        }

        if let Some(port) = service.listen_port() {
            if let Some(first) = ports.insert(port, service.name.as_str()) {
                errors.push(ValidationError::DuplicatePort {
                    port,
                    first: first.to_string(),
                    second: service.name.clone(),
                });
            }
        }

        if let ServiceRule::Http(rule) = &service.rule {
            if rule.rule.trim().is_empty() {
                errors.push(ValidationError::EmptyHttpRule(service.name.clone()));
            }
            if rule.rule_type == HttpMatchType::Prefix && !rule.rule.starts_with('/') {
                tracing::warn!(
                    service = %service.name,
                    rule = %rule.rule,
                    "Prefix rule does not start with '/'"
                );
            }
            for pair in rule.url_rewrite.split(',') {
                let parts: Vec<&str> = pair.split(' ').collect();
                if parts.len() == 2 && regex::Regex::new(parts[0]).is_err() {
                    errors.push(ValidationError::InvalidRewrite {
                        service: service.name.clone(),
                        pattern: parts[0].to_string(),
                    });
                }
            }
        }

        let lb = &service.load_balance;
        if lb.ip_list.is_empty() && lb.registry_path.is_none() {
            errors.push(ValidationError::NoBackends(service.name.clone()));
        }
        if !lb.weight_list.is_empty() && lb.weight_list.len() != lb.ip_list.len() {
            errors.push(ValidationError::WeightCountMismatch {
                service: service.name.clone(),
                addresses: lb.ip_list.len(),
                weights: lb.weight_list.len(),
            });
        }
        if lb.weight_list.contains(&0) {
            errors.push(ValidationError::ZeroWeight(service.name.clone()));
        }
    }

    if config.flow.utc_offset().is_none() {
        errors.push(ValidationError::InvalidUtcOffset(config.flow.utc_offset_hours));
    }

    let mut tenant_ids = HashSet::new();
    for tenant in &config.tenants {
        if tenant.app_id.is_empty() {
            errors.push(ValidationError::EmptyTenantId);
        } else if !tenant_ids.insert(tenant.app_id.as_str()) {
            errors.push(ValidationError::DuplicateTenant(tenant.app_id.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::service::{
        GrpcRule, HttpRule, LoadBalanceConfig, ServiceDetail, TcpRule,
    };
    use crate::config::tenant::Tenant;

    fn service(name: &str, rule: ServiceRule) -> ServiceDetail {
        ServiceDetail {
            name: name.to_string(),
            description: String::new(),
            rule,
            access_control: Default::default(),
            load_balance: LoadBalanceConfig {
                ip_list: vec!["127.0.0.1:9000".into()],
                ..Default::default()
            },
        }
    }

    fn http(prefix: &str) -> ServiceRule {
        ServiceRule::Http(HttpRule {
            rule: prefix.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn accepts_default_config() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn reports_every_problem() {
        let mut config = GatewayConfig::default();
        config.services.push(service("a", http("/a")));
        config.services.push(service("a", http("")));
        config.services.push(service("t", ServiceRule::Tcp(TcpRule { port: 9100 })));
        config.services.push(service(
            "g",
            ServiceRule::Grpc(GrpcRule {
                port: 9100,
                header_transform: String::new(),
            }),
        ));
        config.tenants.push(Tenant {
            app_id: "app".into(),
            ..Default::default()
        });
        config.tenants.push(Tenant {
            app_id: "app".into(),
            ..Default::default()
        });

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::DuplicateService("a".into())));
        assert!(errors.contains(&ValidationError::EmptyHttpRule("a".into())));
        assert!(errors.contains(&ValidationError::DuplicatePort {
            port: 9100,
            first: "t".into(),
            second: "g".into(),
        }));
        assert!(errors.contains(&ValidationError::DuplicateTenant("app".into())));
    }

    #[test]
    fn checks_backends_and_weights() {
        let mut svc = service("w", http("/w"));
        svc.load_balance.ip_list = vec!["a:1".into(), "b:1".into()];
        svc.load_balance.weight_list = vec![0];
        let mut empty = service("e", http("/e"));
        empty.load_balance.ip_list.clear();

        let mut config = GatewayConfig::default();
        config.services = vec![svc, empty];

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::WeightCountMismatch {
            service: "w".into(),
            addresses: 2,
            weights: 1,
        }));
        assert!(errors.contains(&ValidationError::ZeroWeight("w".into())));
        assert!(errors.contains(&ValidationError::NoBackends("e".into())));
    }

    #[test]
    fn rejects_out_of_range_utc_offset() {
        let mut config = GatewayConfig::default();
        config.flow.utc_offset_hours = 8;
        assert!(validate_config(&config).is_ok());

        for hours in [24, -30, i32::MAX, i32::MIN] {
            config.flow.utc_offset_hours = hours;
            assert_eq!(
                validate_config(&config).unwrap_err(),
                vec![ValidationError::InvalidUtcOffset(hours)]
            );
        }
    }

    #[test]
    fn rejects_bad_rewrite_pattern() {
        let mut config = GatewayConfig::default();
        config.services.push(service(
            "r",
            ServiceRule::Http(HttpRule {
                rule: "/r".into(),
                url_rewrite: "^/r/(.*$ /$1".into(),
                ..Default::default()
            }),
        ));

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::InvalidRewrite {
                service: "r".into(),
                pattern: "^/r/(.*$".into(),
            }]
        );
    }
}
