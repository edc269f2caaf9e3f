//! AWS pricing catalog
//!
//! Reads the public AWS Price List bulk offer files.
//! https://docs.aws.amazon.com/awsaccountbilling/latest/aboutv2/using-ppslong.html
//!
//! An offer file covers one service in one region. It is streamed to a disk
//! cache, parsed once per process, and TERM_MATCH filters are applied locally
//! against product attributes. Regions without an offer file price as empty.

use async_trait::async_trait;
use domain_estimation::catalog::fields;
use domain_estimation::{CatalogClient, CatalogEntry, CatalogError, CatalogResult, PriceQuery};
use observability::{CatalogTimer, EstimationMetrics};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use crate::config::AwsConfig;

const PROVIDER: &str = "aws";

/// One product of an offer file
#[derive(Debug, Clone, Deserialize)]
struct Product {
    sku: String,
    #[serde(rename = "productFamily", default)]
    product_family: Option<String>,
    #[serde(default)]
    attributes: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct OfferTerms {
    #[serde(rename = "OnDemand", default)]
    on_demand: HashMap<String, Value>,
}

/// On-demand view of a bulk offer file for one service and region
#[derive(Debug, Default, Deserialize)]
struct OfferFile {
    #[serde(default)]
    products: BTreeMap<String, Product>,
    #[serde(default)]
    terms: OfferTerms,
}

impl OfferFile {
    /// Products matching every attribute filter, in SKU order, shaped as catalog entries
    fn matching_entries(&self, query: &PriceQuery) -> Vec<CatalogEntry> {
        self.products
            .values()
            .filter(|product| {
                query.attribute_filters().all(|filter| {
                    product
                        .attributes
                        .get(&filter.field)
                        .is_some_and(|value| filter.matches(value))
                })
            })
            .filter_map(|product| {
                let terms = self.terms.on_demand.get(&product.sku)?;
                Some(json!({
                    "product": {
                        "sku": product.sku,
                        "productFamily": product.product_family,
                        "attributes": product.attributes,
                    },
                    "terms": { "OnDemand": terms },
                }))
            })
            .take(query.max_results)
            .collect()
    }
}

/// Region an offer file is published under.
///
/// Availability zones ("us-east-1a") map to their parent region.
fn offer_region(region: &str) -> &str {
    let bytes = region.as_bytes();
    match bytes {
        [.., digit, zone] if digit.is_ascii_digit() && zone.is_ascii_lowercase() => {
            &region[..region.len() - 1]
        }
        _ => region,
    }
}

type OfferSlot = Arc<OnceCell<Arc<OfferFile>>>;

/// [`CatalogClient`] over the AWS Price List bulk API
pub struct AwsOfferCatalog {
    client: Client,
    endpoint: String,
    default_region: String,
    cache_dir: PathBuf,
    cache_ttl: Duration,
    download_timeout: Duration,
    offers: Mutex<HashMap<String, OfferSlot>>,
}

impl AwsOfferCatalog {
    pub fn new(config: &AwsConfig) -> Self {
        Self {
            client: Client::new(),
            endpoint: config.endpoint.clone(),
            default_region: config.pricing_region.clone(),
            cache_dir: config.offer_cache_dir.clone(),
            cache_ttl: config.offer_cache_ttl,
            download_timeout: config.download_timeout,
            offers: Mutex::new(HashMap::new()),
        }
    }

    fn offer_url(&self, service: &str, region: &str) -> String {
        format!(
            "{}/offers/v1.0/aws/{}/current/{}/index.json",
            self.endpoint, service, region
        )
    }

    fn cache_path(&self, service: &str, region: &str) -> PathBuf {
        self.cache_dir.join(service).join(format!("{region}.json"))
    }

    fn region_for<'a>(&'a self, query: &'a PriceQuery) -> &'a str {
        offer_region(
            query
                .filter_value(fields::REGION)
                .unwrap_or(self.default_region.as_str()),
        )
    }

    async fn slot(&self, key: String) -> OfferSlot {
        let mut offers = self.offers.lock().await;
        offers.entry(key).or_default().clone()
    }

    /// Offer file for a service and region, loaded at most once per process
    async fn offer(&self, service: &str, region: &str) -> CatalogResult<Arc<OfferFile>> {
        let slot = self.slot(format!("{service}/{region}")).await;
        let offer = slot.get_or_try_init(|| self.load(service, region)).await?;
        Ok(offer.clone())
    }

    async fn load(&self, service: &str, region: &str) -> CatalogResult<Arc<OfferFile>> {
        let path = self.cache_path(service, region);

        if self.is_fresh(&path).await {
            debug!(path = %path.display(), "Using cached AWS offer file");
        } else {
            let downloaded = tokio::time::timeout(
                self.download_timeout,
                self.download(service, region, &path),
            )
            .await
            .map_err(|_| CatalogError::Timeout(self.download_timeout))??;

            if !downloaded {
                return Ok(Arc::new(OfferFile::default()));
            }
        }

        let offer = read_offer(path).await?;
        debug!(
            service = service,
            region = region,
            products = offer.products.len(),
            "Loaded AWS offer file"
        );
        Ok(Arc::new(offer))
    }

    async fn is_fresh(&self, path: &Path) -> bool {
        let Ok(metadata) = tokio::fs::metadata(path).await else {
            return false;
        };
        metadata
            .modified()
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|age| age < self.cache_ttl)
    }

    /// Stream an offer file to `path`. `Ok(false)` when the region has none.
    async fn download(&self, service: &str, region: &str, path: &Path) -> CatalogResult<bool> {
        let url = self.offer_url(service, region);
        info!(service = service, region = region, "Downloading AWS offer file");

        let mut response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CatalogError::Transport(e.to_string()))?;

        let status = response.status();
        // S3 answers 403 rather than 404 for missing keys
        if status == StatusCode::NOT_FOUND || status == StatusCode::FORBIDDEN {
            warn!(status = %status, url = %url, "No AWS offer file for region");
            return Ok(false);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = %status, url = %url, "AWS offer file request failed");
            return Err(status_error(status, message));
        }

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(|e| cache_error(dir, e))?;
        }
        let partial = path.with_extension("json.part");
        let mut file = tokio::fs::File::create(&partial)
            .await
            .map_err(|e| cache_error(&partial, e))?;

        let mut written: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| CatalogError::Transport(e.to_string()))?
        {
            file.write_all(&chunk).await.map_err(|e| cache_error(&partial, e))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| cache_error(&partial, e))?;
        drop(file);

        tokio::fs::rename(&partial, path)
            .await
            .map_err(|e| cache_error(path, e))?;
        debug!(path = %path.display(), bytes = written, "Cached AWS offer file");
        Ok(true)
    }
}

/// Parse a cached offer file off the async runtime; a corrupt file is removed
async fn read_offer(path: PathBuf) -> CatalogResult<OfferFile> {
    let parse_path = path.clone();
    let parsed = tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&parse_path).map_err(|e| cache_error(&parse_path, e))?;
        serde_json::from_reader::<_, OfferFile>(std::io::BufReader::new(file))
            .map_err(|e| CatalogError::Parse(e.to_string()))
    })
    .await
    .map_err(|e| CatalogError::Transport(e.to_string()))?;

    if let Err(CatalogError::Parse(_)) = &parsed {
        warn!(path = %path.display(), "Discarding unreadable AWS offer file");
        let _ = tokio::fs::remove_file(&path).await;
    }
    parsed
}

fn cache_error(path: &Path, error: std::io::Error) -> CatalogError {
    CatalogError::Transport(format!("offer cache {}: {}", path.display(), error))
}

fn status_error(status: StatusCode, message: String) -> CatalogError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            CatalogError::Auth(format!("HTTP {}", status.as_u16()))
        }
        _ => CatalogError::Status {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl CatalogClient for AwsOfferCatalog {
    fn name(&self) -> &'static str {
        "AWS"
    }

    async fn initialize(&self) -> CatalogResult<()> {
        let url = format!("{}/offers/v1.0/aws/index.json", self.endpoint);
        let response = self
            .client
            .head(&url)
            .send()
            .await
            .map_err(|e| CatalogError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(status_error(status, String::new()))
        }
    }

    async fn prepare(&self, query: &PriceQuery) -> CatalogResult<()> {
        self.offer(&query.service_code, self.region_for(query))
            .await
            .map(|_| ())
    }

    async fn query(&self, query: &PriceQuery) -> CatalogResult<Vec<CatalogEntry>> {
        let region = self.region_for(query);

        let mut timer = CatalogTimer::new(PROVIDER, &query.service_code);
        let result = self
            .offer(&query.service_code, region)
            .await
            .map(|offer| offer.matching_entries(query));
        timer.stop();

        let outcome = match &result {
            Ok(entries) if entries.is_empty() => "empty",
            Ok(_) => "ok",
            Err(_) => "error",
        };
        EstimationMetrics::record_catalog_query(PROVIDER, &query.service_code, outcome);

        result
    }
}
