//! Reading classification: pure, total functions from validated values to a
//! qualitative label. Nothing here reads external state.

use std::fmt;

use serde::Serialize;

use crate::models::{GlucoseContext, Measurement, Unit};

/// Multiply mmol/L by this to get mg/dL.
pub const GLUCOSE_MGDL_PER_MMOL: f64 = 18.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BloodPressureCategory {
    Normal,
    Elevated,
    Stage1,
    Stage2,
    HypertensiveCrisis,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TemperatureStatus {
    BelowNormal,
    Normal,
    MildFever,
    HighFever,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HeartRateZone {
    BelowResting,
    Resting,
    NormalActivity,
    ModerateExercise,
    IntenseExercise,
    MaximumEffort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GlucoseStatus {
    Low,
    Normal,
    Prediabetic,
    Diabetic,
    High,
}

/// Derived label of a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "category", rename_all = "snake_case")]
pub enum Classification {
    BloodPressure(BloodPressureCategory),
    Glucose(GlucoseStatus),
    Temperature(TemperatureStatus),
    HeartRate(HeartRateZone),
}

impl BloodPressureCategory {
    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Elevated => "Elevated",
            Self::Stage1 => "High BP (Stage 1)",
            Self::Stage2 => "High BP (Stage 2)",
            Self::HypertensiveCrisis => "Hypertensive Crisis",
            Self::Unknown => "Unknown",
        }
    }
}

impl TemperatureStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::BelowNormal => "Below normal",
            Self::Normal => "Normal",
            Self::MildFever => "Mild fever",
            Self::HighFever => "High fever",
        }
    }
}

impl HeartRateZone {
    pub fn label(self) -> &'static str {
        match self {
            Self::BelowResting => "Below resting",
            Self::Resting => "Resting",
            Self::NormalActivity => "Normal activity",
            Self::ModerateExercise => "Moderate exercise",
            Self::IntenseExercise => "Intense exercise",
            Self::MaximumEffort => "Maximum effort",
        }
    }
}

impl GlucoseStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Normal => "Normal",
            Self::Prediabetic => "Prediabetic",
            Self::Diabetic => "Diabetic",
            Self::High => "High",
        }
    }
}

impl Classification {
    pub fn label(&self) -> &'static str {
        match self {
            Self::BloodPressure(c) => c.label(),
            Self::Glucose(c) => c.label(),
            Self::Temperature(c) => c.label(),
            Self::HeartRate(c) => c.label(),
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Blood pressure bands, first match wins.
///
/// The order is kept exactly as the app has always evaluated it: Stage 1 is
/// tested before Stage 2 and Stage 2 before crisis, so a crisis-level pair
/// reports Stage 2 and 145/85 reports Stage 1. Do not reorder without a
/// product decision.
pub fn classify_blood_pressure(systolic: f64, diastolic: f64) -> BloodPressureCategory {
    let (s, d) = (systolic, diastolic);
    if s < 120.0 && d < 80.0 {
        BloodPressureCategory::Normal
    } else if (120.0..=129.0).contains(&s) && d < 80.0 {
        BloodPressureCategory::Elevated
    } else if (130.0..=139.0).contains(&s) || (80.0..=89.0).contains(&d) {
        BloodPressureCategory::Stage1
    } else if s >= 140.0 || d >= 90.0 {
        BloodPressureCategory::Stage2
    } else if s > 180.0 || d > 120.0 {
        BloodPressureCategory::HypertensiveCrisis
    } else {
        BloodPressureCategory::Unknown
    }
}

pub fn classify_temperature(degrees: f64, unit: Unit) -> TemperatureStatus {
    let (low, normal, mild) = match unit {
        Unit::Celsius => (36.1, 37.2, 38.0),
        _ => (97.0, 99.0, 100.4),
    };
    if degrees < low {
        TemperatureStatus::BelowNormal
    } else if degrees <= normal {
        TemperatureStatus::Normal
    } else if degrees <= mild {
        TemperatureStatus::MildFever
    } else {
        TemperatureStatus::HighFever
    }
}

pub fn classify_heart_rate(bpm: f64) -> HeartRateZone {
    if bpm < 60.0 {
        HeartRateZone::BelowResting
    } else if bpm <= 70.0 {
        HeartRateZone::Resting
    } else if bpm <= 100.0 {
        HeartRateZone::NormalActivity
    } else if bpm <= 140.0 {
        HeartRateZone::ModerateExercise
    } else if bpm <= 170.0 {
        HeartRateZone::IntenseExercise
    } else {
        HeartRateZone::MaximumEffort
    }
}

/// Glucose bands are defined in mg/dL; mmol/L values are converted first.
pub fn classify_glucose(level: f64, unit: Unit, context: GlucoseContext) -> GlucoseStatus {
    let mg_dl = match unit {
        Unit::MmolPerL => level * GLUCOSE_MGDL_PER_MMOL,
        _ => level,
    };
    if mg_dl < 70.0 {
        return GlucoseStatus::Low;
    }
    match context {
        GlucoseContext::Fasting if mg_dl < 100.0 => GlucoseStatus::Normal,
        GlucoseContext::Fasting if mg_dl < 126.0 => GlucoseStatus::Prediabetic,
        GlucoseContext::Fasting => GlucoseStatus::Diabetic,
        GlucoseContext::PostPrandial if mg_dl < 140.0 => GlucoseStatus::Normal,
        GlucoseContext::PostPrandial if mg_dl < 200.0 => GlucoseStatus::Prediabetic,
        GlucoseContext::PostPrandial => GlucoseStatus::Diabetic,
        GlucoseContext::Random if mg_dl < 200.0 => GlucoseStatus::Normal,
        GlucoseContext::Random => GlucoseStatus::High,
    }
}

/// Classify any measurement. The variant selects the classifier.
pub fn classify(measurement: &Measurement, unit: Unit) -> Classification {
    match *measurement {
        Measurement::BloodPressure {
            systolic,
            diastolic,
            ..
        } => Classification::BloodPressure(classify_blood_pressure(systolic, diastolic)),
        Measurement::Glucose { level, context } => {
            Classification::Glucose(classify_glucose(level, unit, context))
        }
        Measurement::Temperature { degrees } => {
            Classification::Temperature(classify_temperature(degrees, unit))
        }
        Measurement::HeartRate { bpm } => Classification::HeartRate(classify_heart_rate(bpm)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blood_pressure_reference_pairs() {
        assert_eq!(classify_blood_pressure(119.0, 79.0).label(), "Normal");
        assert_eq!(classify_blood_pressure(125.0, 75.0).label(), "Elevated");
        assert_eq!(classify_blood_pressure(135.0, 85.0).label(), "High BP (Stage 1)");
        assert_eq!(classify_blood_pressure(145.0, 95.0).label(), "High BP (Stage 2)");
    }

    #[test]
    fn blood_pressure_first_match_order_is_preserved() {
        // Diastolic in the Stage 1 band wins over a Stage 2 systolic.
        assert_eq!(classify_blood_pressure(145.0, 85.0), BloodPressureCategory::Stage1);
        // Crisis-level values are caught by the Stage 2 band first.
        assert_eq!(classify_blood_pressure(190.0, 125.0), BloodPressureCategory::Stage2);
    }

    #[test]
    fn blood_pressure_gaps_are_unknown() {
        assert_eq!(classify_blood_pressure(129.5, 70.0), BloodPressureCategory::Unknown);
    }

    #[test]
    fn blood_pressure_band_edges() {
        assert_eq!(classify_blood_pressure(120.0, 79.0), BloodPressureCategory::Elevated);
        assert_eq!(classify_blood_pressure(129.0, 79.0), BloodPressureCategory::Elevated);
        assert_eq!(classify_blood_pressure(119.0, 80.0), BloodPressureCategory::Stage1);
        assert_eq!(classify_blood_pressure(139.0, 70.0), BloodPressureCategory::Stage1);
        assert_eq!(classify_blood_pressure(140.0, 70.0), BloodPressureCategory::Stage2);
        assert_eq!(classify_blood_pressure(110.0, 90.0), BloodPressureCategory::Stage2);
    }

    #[test]
    fn fahrenheit_reference_values() {
        assert_eq!(classify_temperature(99.0, Unit::Fahrenheit).label(), "Normal");
        assert_eq!(classify_temperature(100.5, Unit::Fahrenheit).label(), "High fever");
        assert_eq!(classify_temperature(96.9, Unit::Fahrenheit).label(), "Below normal");
        assert_eq!(classify_temperature(97.0, Unit::Fahrenheit).label(), "Normal");
        assert_eq!(classify_temperature(100.4, Unit::Fahrenheit).label(), "Mild fever");
    }

    #[test]
    fn celsius_bands() {
        assert_eq!(classify_temperature(36.0, Unit::Celsius), TemperatureStatus::BelowNormal);
        assert_eq!(classify_temperature(37.2, Unit::Celsius), TemperatureStatus::Normal);
        assert_eq!(classify_temperature(37.5, Unit::Celsius), TemperatureStatus::MildFever);
        assert_eq!(classify_temperature(38.1, Unit::Celsius), TemperatureStatus::HighFever);
    }

    #[test]
    fn heart_rate_zones() {
        let cases = [
            (59.0, "Below resting"),
            (60.0, "Resting"),
            (70.0, "Resting"),
            (71.0, "Normal activity"),
            (100.0, "Normal activity"),
            (140.0, "Moderate exercise"),
            (170.0, "Intense exercise"),
            (171.0, "Maximum effort"),
        ];
        for (bpm, label) in cases {
            assert_eq!(classify_heart_rate(bpm).label(), label, "bpm {bpm}");
        }
    }

    #[test]
    fn glucose_by_context() {
        assert_eq!(classify_glucose(65.0, Unit::MgPerDl, GlucoseContext::Random), GlucoseStatus::Low);
        assert_eq!(classify_glucose(95.0, Unit::MgPerDl, GlucoseContext::Fasting), GlucoseStatus::Normal);
        assert_eq!(classify_glucose(110.0, Unit::MgPerDl, GlucoseContext::Fasting), GlucoseStatus::Prediabetic);
        assert_eq!(classify_glucose(126.0, Unit::MgPerDl, GlucoseContext::Fasting), GlucoseStatus::Diabetic);
        assert_eq!(classify_glucose(150.0, Unit::MgPerDl, GlucoseContext::PostPrandial), GlucoseStatus::Prediabetic);
        assert_eq!(classify_glucose(210.0, Unit::MgPerDl, GlucoseContext::Random), GlucoseStatus::High);
    }

    #[test]
    fn glucose_mmol_is_converted() {
        // 5.2 mmol/L = 93.6 mg/dL
        assert_eq!(classify_glucose(5.2, Unit::MmolPerL, GlucoseContext::Fasting), GlucoseStatus::Normal);
        // 7.5 mmol/L = 135 mg/dL
        assert_eq!(classify_glucose(7.5, Unit::MmolPerL, GlucoseContext::Fasting), GlucoseStatus::Diabetic);
    }

    #[test]
    fn classify_is_deterministic() {
        let m = Measurement::BloodPressure {
            systolic: 135.0,
            diastolic: 85.0,
            pulse: 70.0,
        };
        assert_eq!(classify(&m, Unit::MmHg), classify(&m, Unit::MmHg));
        assert_eq!(classify(&m, Unit::MmHg).to_string(), "High BP (Stage 1)");
    }
}
