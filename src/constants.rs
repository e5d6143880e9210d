//! Column and naming constants shared by every pipeline stage.
//!
//! Input column names follow the platform's classification and subject exports.

// Classifications export
pub const CLASSIFICATION_ID: &str = "classification_id";
pub const SUBJECT_IDS: &str = "subject_ids";
pub const USER_NAME: &str = "user_name";
pub const USER_ID: &str = "user_id";
pub const USER_IP: &str = "user_ip";
pub const WORKFLOW_ID: &str = "workflow_id";
pub const ANNOTATIONS: &str = "annotations";

// Shared by both exports
pub const METADATA: &str = "metadata";

// Subjects export
pub const SUBJECT_ID: &str = "subject_id";
pub const LOCATIONS: &str = "locations";

// Derived identity columns
pub const USER_NAME_HASH: &str = "user_name_hash";
pub const LOGGED_IN: &str = "logged_in";

/// Raw PII columns that must never reach the exported file.
pub const PII_COLUMNS: [&str; 3] = [USER_NAME, USER_ID, USER_IP];

/// Substring the platform embeds in the user name of anonymous sessions.
pub const DEFAULT_ANONYMOUS_MARKER: &str = "not-logged-in";

pub const DEFAULT_OUTPUT_FILE: &str = "anonymized_classifications.csv";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_LOG_DIR: &str = "logs";

// Origin labels used to disambiguate column name collisions
pub const ORIGIN_METADATA: &str = "metadata";
pub const ORIGIN_ANNOTATIONS: &str = "annotations";
pub const CLASSIFICATION_SUFFIX: &str = "_classification";
pub const SUBJECT_SUFFIX: &str = "_subject";

/// Delimiter used when collapsing a subject's locations into one cell.
pub const LOCATION_SEPARATOR: &str = ", ";

// Table names used in error messages and logs
pub const CLASSIFICATIONS_TABLE: &str = "classifications";
pub const SUBJECTS_TABLE: &str = "subjects";

/// Columns the classifications export must provide.
pub fn required_classification_columns() -> Vec<&'static str> {
    vec![
        CLASSIFICATION_ID,
        SUBJECT_IDS,
        USER_NAME,
        USER_ID,
        USER_IP,
        METADATA,
        ANNOTATIONS,
    ]
}

/// Columns the subjects export must provide.
pub fn required_subject_columns() -> Vec<&'static str> {
    vec![SUBJECT_ID, METADATA, LOCATIONS]
}
