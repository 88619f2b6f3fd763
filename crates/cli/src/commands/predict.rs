//! Local prediction from raw listing values

use anyhow::Result;
use rent_lib::{PredictionResponse, RawRecord, RawValue, Settings};

use super::local_service;
use crate::output::{format_rent, print_info, print_json, print_success, OutputFormat};

/// A listing as it appears in the source data
pub struct RawListing {
    pub area: f64,
    pub construction_year: i64,
    pub bedrooms: i64,
    pub garden: String,
    pub balcony: String,
    pub parking: String,
    pub furnished: String,
    pub garage: String,
    pub storage: String,
}

impl RawListing {
    pub fn to_record(&self) -> RawRecord {
        let mut record = RawRecord::new();
        record.insert("area".into(), RawValue::Real(self.area));
        record.insert("construction_year".into(), self.construction_year.into());
        record.insert("bedrooms".into(), self.bedrooms.into());
        record.insert("garden".into(), self.garden.as_str().into());
        record.insert("balcony".into(), self.balcony.as_str().into());
        record.insert("parking".into(), self.parking.as_str().into());
        record.insert("furnished".into(), self.furnished.as_str().into());
        record.insert("garage".into(), self.garage.as_str().into());
        record.insert("storage".into(), self.storage.as_str().into());
        record
    }
}

/// Encode the listing with the stored schema and predict, training first if needed
pub async fn predict(settings: &Settings, listing: &RawListing, format: OutputFormat) -> Result<()> {
    let service = local_service(settings, None)?;
    let outcome = service.ensure_loaded().await?;
    let prediction = service.predict_record(&listing.to_record()).await?;

    match format {
        OutputFormat::Json => print_json(&PredictionResponse {
            prediction: vec![prediction],
        })?,
        OutputFormat::Table => {
            if outcome == rent_lib::LoadOutcome::TrainedAndLoaded {
                print_info("No model artifact was found; trained a new one");
            }
            print_success(&format!("Predicted monthly rent: {}", format_rent(prediction)));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_record_columns() {
        let listing = RawListing {
            area: 85.0,
            construction_year: 2015,
            bedrooms: 2,
            garden: "Present (20 m²)".to_string(),
            balcony: "yes".to_string(),
            parking: "yes".to_string(),
            furnished: "no".to_string(),
            garage: "no".to_string(),
            storage: "yes".to_string(),
        };
        let record = listing.to_record();

        assert_eq!(record.len(), 9);
        assert_eq!(record["construction_year"], RawValue::Integer(2015));
        assert_eq!(record["garden"], RawValue::Text("Present (20 m²)".to_string()));
    }
}
