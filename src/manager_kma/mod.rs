pub mod errors;
mod models;

use std::time::Duration;
use async_trait::async_trait;
use reqwest::Client;
use crate::extractor::{canonical, ForecastRecord};
use crate::manager_kma::errors::KmaError;
use crate::manager_kma::models::Envelope;
use crate::manager_refresh::ForecastFetcher;

const KMA_DOMAIN: &str = "https://apis.data.go.kr";
const VILAGE_PATH: &str = "/1360000/VilageFcstInfoService_2.0/getVilageFcst";
const RESULT_OK: &str = "00";
const PAGE_SIZE: u32 = 300;

/// Struct for managing village forecasts published by the KMA open-data API
pub struct Kma {
    client: Client,
    service_key: String,
    nx: i32,
    ny: i32,
}

impl Kma {
    /// Returns a Kma struct ready for fetching forecast batches for one grid cell.
    ///
    /// The API can be very slow under load, hence the generous per-request timeout.
    ///
    /// # Arguments
    ///
    /// * 'service_key' - open-data portal service key
    /// * 'nx' - grid x coordinate of the location
    /// * 'ny' - grid y coordinate of the location
    pub fn new(service_key: &str, nx: i32, ny: i32) -> Result<Kma, KmaError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            client,
            service_key: service_key.to_string(),
            nx,
            ny,
        })
    }

    /// Retrieves the full forecast batch for one issuance.
    ///
    /// The result code must be the success sentinel and the item list must be
    /// non-empty, anything else fails this attempt. Cell values are
    /// canonicalized on the way in so the matcher sees uniform strings.
    ///
    /// # Arguments
    ///
    /// * 'base_date' - issuance date, YYYYMMDD
    /// * 'base_time' - issuance time, HHMM
    pub async fn fetch_forecast(
        &self,
        base_date: &str,
        base_time: &str,
    ) -> Result<Vec<ForecastRecord>, KmaError> {
        let url = format!("{}{}", KMA_DOMAIN, VILAGE_PATH);
        let nx = self.nx.to_string();
        let ny = self.ny.to_string();
        let rows = PAGE_SIZE.to_string();

        let req = self.client
            .get(url)
            .query(&[
                ("serviceKey", self.service_key.as_str()),
                ("base_date", base_date),
                ("base_time", base_time),
                ("nx", nx.as_str()),
                ("ny", ny.as_str()),
                ("dataType", "JSON"),
                ("numOfRows", rows.as_str()),
                ("pageNo", "1"),
            ])
            .send().await?;

        let status = req.status();
        if !status.is_success() {
            return Err(KmaError::Api(format!("error while fetching forecast from KMA: {}", status)));
        }

        let json = req.text().await?;
        let envelope: Envelope = serde_json::from_str(&json)?;

        let header = envelope.response.header;
        if header.result_code != RESULT_OK {
            return Err(KmaError::Api(format!(
                "KMA returned result {}: {}", header.result_code, header.result_msg
            )));
        }

        let items = envelope.response.body
            .and_then(|b| b.items)
            .and_then(|i| i.item)
            .unwrap_or_default();

        let records: Vec<ForecastRecord> = items.into_iter()
            .map(|item| ForecastRecord {
                date: canonical(&item.fcst_date),
                time_slot: canonical(&item.fcst_time),
                category: canonical(&item.category),
                value: canonical(&item.fcst_value),
                grid_x: item.nx,
                grid_y: item.ny,
            })
            .collect();

        if records.is_empty() {
            Err(KmaError::Document(format!("no forecast items for {} {}", base_date, base_time)))
        } else {
            Ok(records)
        }
    }
}

#[async_trait]
impl ForecastFetcher for Kma {
    async fn fetch(&self, base_date: &str, base_time: &str) -> Result<Vec<ForecastRecord>, String> {
        self.fetch_forecast(base_date, base_time).await.map_err(|e| e.to_string())
    }
}
