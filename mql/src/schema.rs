//! Schema contract the compiler targets.
//!
//! The storage schema is owned by the ingestion side; these names are the
//! fixed interface between it and the generated SQL. Renaming anything here is
//! a breaking change for every database written by the ingestion pipeline.

/// A table name together with the alias the generated SQL uses for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Table {
    /// Table name as created in the database.
    pub name: &'static str,
    /// Short alias used in joins.
    pub alias: &'static str,
    /// Column names, primary key first.
    pub columns: &'static [&'static str],
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.columns.join(", "))
    }
}

/// Distinct metric sample names.
pub const SAMPLE_NAME: Table = Table {
    name: "sample_name",
    alias: "sn",
    columns: &["id", "sample"],
};

/// One time series: a sample name bound to a label set.
pub const METRIC_INSTANCE: Table = Table {
    name: "metric_instance",
    alias: "mi",
    columns: &["id", "sample_name_id", "label_set_id"],
};

/// Observations, append-only per metric instance.
pub const SAMPLE_VALUE: Table = Table {
    name: "sample_value",
    alias: "sv",
    columns: &["id", "metric_instance_id", "timestamp_ms", "value"],
};

/// Interned label keys.
pub const LABEL_KEY: Table = Table {
    name: "label_key",
    alias: "lk",
    columns: &["id", "name"],
};

/// Interned label values.
pub const LABEL_VALUE: Table = Table {
    name: "label_value",
    alias: "lv",
    columns: &["id", "value"],
};

/// Immutable label sets identified by content hash.
pub const LABEL_SET: Table = Table {
    name: "label_set",
    alias: "ls",
    columns: &["id", "hash"],
};

/// Decomposition of a label set into key/value pairs.
pub const LABEL_SET_MEMBERSHIP: Table = Table {
    name: "label_set_membership",
    alias: "lsm",
    columns: &["label_set_id", "label_key_id", "label_value_id"],
};

/// Optional quantile rows attached to summary samples.
pub const SAMPLE_QUANTILE: Table = Table {
    name: "sample_quantile",
    alias: "sq",
    columns: &["sample_value_id", "quantile", "quantile_value"],
};

/// Every table of the contract, in dependency order.
pub const TABLES: &[Table] = &[
    SAMPLE_NAME,
    LABEL_KEY,
    LABEL_VALUE,
    LABEL_SET,
    LABEL_SET_MEMBERSHIP,
    METRIC_INSTANCE,
    SAMPLE_VALUE,
    SAMPLE_QUANTILE,
];

/// Column holding the sample timestamp in epoch milliseconds.
pub const TIMESTAMP_COLUMN: &str = "timestamp_ms";

/// Column holding the sample value.
pub const VALUE_COLUMN: &str = "value";
