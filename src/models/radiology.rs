use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A radiology picture taken with the camera or picked from the gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadiologyImage {
    pub name: String,
    /// Device-local URI of the image; the bytes never leave the device.
    pub uri: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub notes: String,
}
