use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The serde name of each variant is its string form.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

// Per-user subcollections under users/{ownerId}/.
str_enum!(Collection {
    BloodGlucose => "bloodGlucose",
    Temperature => "temperature",
    HeartRate => "heartRate",
    BloodPressure => "bloodPressure",
    Allergies => "allergies",
    LabResults => "labResults",
    ShareTokens => "shareTokens",
    Radiology => "radiology",
});

str_enum!(VitalKind {
    BloodPressure => "blood_pressure",
    Glucose => "blood_glucose",
    Temperature => "temperature",
    HeartRate => "heart_rate",
});

str_enum!(Unit {
    MmHg => "mmHg",
    MgPerDl => "mg/dL",
    MmolPerL => "mmol/L",
    Fahrenheit => "°F",
    Celsius => "°C",
    Bpm => "bpm",
});

str_enum!(GlucoseContext {
    Fasting => "Fasting",
    PostPrandial => "PostPrandial",
    Random => "Random",
});

impl VitalKind {
    pub const ALL: [VitalKind; 4] = [
        VitalKind::BloodPressure,
        VitalKind::Glucose,
        VitalKind::Temperature,
        VitalKind::HeartRate,
    ];
}
