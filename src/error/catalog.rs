/// Static error catalog
///
/// Every [`ErrorType`] maps to a fixed entry holding its error code, default
/// severity, default retry/recovery flags and remediation text. Codes are
/// grouped by concern:
/// - 1000-1999: Input errors (validation, configuration, template)
/// - 2000-2999: Execution errors (execution, timeout)
/// - 3000-3999: Assertion errors
/// - 4000-4999: Integration errors (network, database, messaging)
/// - 5000-5999: Filesystem errors
/// - 6000-6999: Security errors
use super::{ErrorType, Severity};

/// Catalog defaults for one error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub code: u16,
    pub severity: Severity,
    pub retryable: bool,
    pub recoverable: bool,
    pub user_message: &'static str,
    pub remediation: &'static str,
}

const VALIDATION: CatalogEntry = CatalogEntry {
    code: 1000,
    severity: Severity::Medium,
    retryable: false,
    recoverable: true,
    user_message: "Invalid input",
    remediation: "Check the step arguments and options against the action's expected parameters",
};

const CONFIGURATION: CatalogEntry = CatalogEntry {
    code: 1100,
    severity: Severity::High,
    retryable: false,
    recoverable: false,
    user_message: "Configuration problem",
    remediation: "Review the test case file and runner configuration for missing or invalid values",
};

const TEMPLATE: CatalogEntry = CatalogEntry {
    code: 1200,
    severity: Severity::Low,
    retryable: false,
    recoverable: true,
    user_message: "Template could not be resolved",
    remediation: "Make sure every ${variable} is defined before the step that uses it",
};

const EXECUTION: CatalogEntry = CatalogEntry {
    code: 2000,
    severity: Severity::High,
    retryable: false,
    recoverable: true,
    user_message: "Action execution failed",
    remediation: "Inspect the action output and breadcrumbs to find the failing operation",
};

const TIMEOUT: CatalogEntry = CatalogEntry {
    code: 2100,
    severity: Severity::Medium,
    retryable: true,
    recoverable: true,
    user_message: "Operation timed out",
    remediation: "Increase the timeout or verify that the target service responds in time",
};

const ASSERTION: CatalogEntry = CatalogEntry {
    code: 3000,
    severity: Severity::Medium,
    retryable: false,
    recoverable: false,
    user_message: "Assertion failed",
    remediation: "Compare the expected and actual values reported by the assertion",
};

const NETWORK: CatalogEntry = CatalogEntry {
    code: 4000,
    severity: Severity::Medium,
    retryable: true,
    recoverable: true,
    user_message: "Network operation failed",
    remediation: "Check connectivity to the target host and consider a retry policy",
};

const DATABASE: CatalogEntry = CatalogEntry {
    code: 4100,
    severity: Severity::High,
    retryable: true,
    recoverable: true,
    user_message: "Database operation failed",
    remediation: "Verify the connection string, credentials and that the database is reachable",
};

const MESSAGING: CatalogEntry = CatalogEntry {
    code: 4200,
    severity: Severity::Medium,
    retryable: true,
    recoverable: true,
    user_message: "Messaging operation failed",
    remediation: "Check broker availability and topic or queue configuration",
};

const FILESYSTEM: CatalogEntry = CatalogEntry {
    code: 5000,
    severity: Severity::Medium,
    retryable: false,
    recoverable: true,
    user_message: "File operation failed",
    remediation: "Verify that the path exists and that the process has the required permissions",
};

const SECURITY: CatalogEntry = CatalogEntry {
    code: 6000,
    severity: Severity::Critical,
    retryable: false,
    recoverable: false,
    user_message: "Security check failed",
    remediation: "Review credentials, certificates and secret configuration",
};

/// Look up the catalog entry for an error type
pub fn catalog_entry(error_type: ErrorType) -> &'static CatalogEntry {
    match error_type {
        ErrorType::Validation => &VALIDATION,
        ErrorType::Configuration => &CONFIGURATION,
        ErrorType::Template => &TEMPLATE,
        ErrorType::Execution => &EXECUTION,
        ErrorType::Timeout => &TIMEOUT,
        ErrorType::Assertion => &ASSERTION,
        ErrorType::Network => &NETWORK,
        ErrorType::Database => &DATABASE,
        ErrorType::Messaging => &MESSAGING,
        ErrorType::Filesystem => &FILESYSTEM,
        ErrorType::Security => &SECURITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_unique() {
        let mut codes: Vec<u16> = ErrorType::ALL
            .iter()
            .map(|t| catalog_entry(*t).code)
            .collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), ErrorType::ALL.len());
    }

    #[test]
    fn test_retry_defaults() {
        assert!(!catalog_entry(ErrorType::Validation).retryable);
        assert!(catalog_entry(ErrorType::Network).retryable);
        assert!(catalog_entry(ErrorType::Database).retryable);
        assert!(catalog_entry(ErrorType::Timeout).retryable);
        assert!(catalog_entry(ErrorType::Messaging).retryable);
        assert!(!catalog_entry(ErrorType::Security).recoverable);
        assert!(!catalog_entry(ErrorType::Assertion).recoverable);
    }

    #[test]
    fn test_security_is_critical() {
        assert_eq!(catalog_entry(ErrorType::Security).severity, Severity::Critical);
    }
}
