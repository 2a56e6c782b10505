//! Field catalog of the census income record accepted by the engine.

pub const AGE: &str = "age";
pub const WORKCLASS: &str = "workclass";
pub const EDUCATION: &str = "education";
pub const EDUCATION_NUM: &str = "education_num";
pub const MARITAL_STATUS: &str = "marital_status";
pub const OCCUPATION: &str = "occupation";
pub const RELATIONSHIP: &str = "relationship";
pub const RACE: &str = "race";
pub const SEX: &str = "sex";
pub const HOURS_PER_WEEK: &str = "hours_per_week";
pub const NATIVE_COUNTRY: &str = "native_country";

/// Fields the engine expects after normalization, in the engine's column order.
pub const REQUIRED_FIELDS: [&str; 10] = [
    AGE,
    WORKCLASS,
    EDUCATION_NUM,
    MARITAL_STATUS,
    OCCUPATION,
    RELATIONSHIP,
    RACE,
    SEX,
    HOURS_PER_WEEK,
    NATIVE_COUNTRY,
];

/// Fields carried as integers by the engine.
pub const NUMERIC_FIELDS: [&str; 3] = [AGE, EDUCATION_NUM, HOURS_PER_WEEK];

/// Inclusive bounds enforced in strict mode.
pub const NUMERIC_BOUNDS: [(&str, i64, i64); 3] = [
    (AGE, 17, 90),
    (EDUCATION_NUM, 1, 16),
    (HOURS_PER_WEEK, 1, 99),
];

/// Education labels ordered by rank (`Preschool` is 1, `Doctorate` is 16).
pub const EDUCATION_LEVELS: [&str; 16] = [
    "Preschool",
    "1st-4th",
    "5th-6th",
    "7th-8th",
    "9th",
    "10th",
    "11th",
    "12th",
    "HS-grad",
    "Some-college",
    "Assoc-voc",
    "Assoc-acdm",
    "Bachelors",
    "Masters",
    "Prof-school",
    "Doctorate",
];

const WORKCLASS_DOMAIN: &[&str] = &[
    "Private",
    "Self-emp-not-inc",
    "Self-emp-inc",
    "Federal-gov",
    "Local-gov",
    "State-gov",
    "Without-pay",
    "Never-worked",
    "?",
];

const MARITAL_STATUS_DOMAIN: &[&str] = &[
    "Married-civ-spouse",
    "Divorced",
    "Never-married",
    "Separated",
    "Widowed",
    "Married-spouse-absent",
    "Married-AF-spouse",
];

const OCCUPATION_DOMAIN: &[&str] = &[
    "Tech-support",
    "Craft-repair",
    "Other-service",
    "Sales",
    "Exec-managerial",
    "Prof-specialty",
    "Handlers-cleaners",
    "Machine-op-inspct",
    "Adm-clerical",
    "Farming-fishing",
    "Transport-moving",
    "Priv-house-serv",
    "Protective-serv",
    "Armed-Forces",
    "?",
];

const RELATIONSHIP_DOMAIN: &[&str] = &[
    "Wife",
    "Own-child",
    "Husband",
    "Not-in-family",
    "Other-relative",
    "Unmarried",
];

const RACE_DOMAIN: &[&str] = &[
    "White",
    "Asian-Pac-Islander",
    "Amer-Indian-Eskimo",
    "Other",
    "Black",
];

const SEX_DOMAIN: &[&str] = &["Male", "Female"];

const NATIVE_COUNTRY_DOMAIN: &[&str] = &[
    "United-States",
    "Cambodia",
    "England",
    "Puerto-Rico",
    "Canada",
    "Germany",
    "Outlying-US(Guam-USVI-etc)",
    "India",
    "Japan",
    "Greece",
    "South",
    "China",
    "Cuba",
    "Iran",
    "Honduras",
    "Philippines",
    "Italy",
    "Poland",
    "Jamaica",
    "Vietnam",
    "Mexico",
    "Portugal",
    "Ireland",
    "France",
    "Dominican-Republic",
    "Laos",
    "Ecuador",
    "Taiwan",
    "Haiti",
    "Columbia",
    "Hungary",
    "Guatemala",
    "Nicaragua",
    "Scotland",
    "Thailand",
    "Yugoslavia",
    "El-Salvador",
    "Trinadad&Tobago",
    "Peru",
    "Hong",
    "Holand-Netherlands",
    "?",
];

/// Categorical fields passed to the engine as strings, with their allowed values.
pub const CATEGORICAL_DOMAINS: [(&str, &[&str]); 7] = [
    (WORKCLASS, WORKCLASS_DOMAIN),
    (MARITAL_STATUS, MARITAL_STATUS_DOMAIN),
    (OCCUPATION, OCCUPATION_DOMAIN),
    (RELATIONSHIP, RELATIONSHIP_DOMAIN),
    (RACE, RACE_DOMAIN),
    (SEX, SEX_DOMAIN),
    (NATIVE_COUNTRY, NATIVE_COUNTRY_DOMAIN),
];

/// Ordinal rank of an education label, if it is one of the census levels.
pub fn education_rank(label: &str) -> Option<u8> {
    EDUCATION_LEVELS
        .iter()
        .position(|level| *level == label)
        .map(|index| index as u8 + 1)
}
