//! Crawl coordinator - main crawl orchestration logic
//!
//! This module sequences the whole pipeline:
//! - Seeding the dedup index from existing output
//! - Resolving target brands once against the brand index
//! - Walking each brand's listing for candidate links
//! - Extracting, re-checking and persisting each candidate in turn

use crate::config::{Config, TargetList};
use crate::crawler::brands::{BrandEntry, BrandResolver};
use crate::crawler::extractor::{Extraction, SpecificationExtractor};
use crate::crawler::fetcher::{RateLimitedFetcher, RetryPolicy};
use crate::crawler::listing::{ModelFilter, ModelLinkCollector};
use crate::crawler::selectors::Selectors;
use crate::crawler::source::{build_source, PageSource};
use crate::output::RunStatistics;
use crate::state::BrandPhase;
use crate::storage::{
    open_brand_output, DedupIndex, DeviceRecord, FeatureSchema, IncrementalWriter, MODEL_IMAGE_COLUMN,
};
use crate::{CatalogError, ConfigError, OutputError};
use std::path::{Path, PathBuf};
use url::Url;

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Config,
    targets: TargetList,
    selectors: Selectors,
    fetcher: RateLimitedFetcher,
    dedup: DedupIndex,
    output_dir: PathBuf,
}

impl Coordinator {
    /// Creates a coordinator using the transport named in the configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `targets` - Brands and models to collect
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(CatalogError)` - The transport or selectors could not be built
    pub fn new(config: Config, targets: TargetList) -> Result<Self, CatalogError> {
        let source = build_source(&config.fetcher)?;
        Self::with_source(config, targets, source)
    }

    /// Creates a coordinator fetching through the given transport
    pub fn with_source(
        config: Config,
        targets: TargetList,
        source: Box<dyn PageSource>,
    ) -> Result<Self, CatalogError> {
        let selectors = Selectors::compile(&config.selectors)?;
        let base_url = Url::parse(&config.site.base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", config.site.base_url, e)))?;

        tracing::info!(
            "Fetching from {} via {} transport",
            base_url,
            source.name()
        );
        let fetcher = RateLimitedFetcher::new(
            source,
            base_url,
            RetryPolicy::from_config(&config.fetcher),
        );

        let output_dir = PathBuf::from(&config.output.directory);
        let dedup = DedupIndex::seed(&output_dir);
        tracing::info!(
            "Seeded {} known devices across {} brands from {}",
            dedup.len(),
            dedup.brand_count(),
            output_dir.display()
        );

        Ok(Self {
            config,
            targets,
            selectors,
            fetcher,
            dedup,
            output_dir,
        })
    }

    pub fn dedup(&self) -> &DedupIndex {
        &self.dedup
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn targets(&self) -> &TargetList {
        &self.targets
    }

    /// Runs the crawl over every target brand
    ///
    /// Fetch failures skip the page, link or brand they hit. Schema
    /// violations drop the record. Only output I/O failures end the run early.
    pub async fn run(&mut self) -> Result<RunStatistics, CatalogError> {
        let mut stats = RunStatistics::start();
        std::fs::create_dir_all(&self.output_dir)?;

        tracing::info!(
            "Starting run for {} target brands with {:?} extraction",
            self.targets.len(),
            self.config.extraction.policy
        );

        let brands = BrandResolver::new(&self.fetcher, &self.selectors)
            .resolve(&self.config.site.brand_index_path, &self.targets.brands())
            .await;
        stats.brands_resolved = brands.len();

        for brand in &brands {
            self.process_brand(brand, &mut stats).await?;
        }

        stats.requests = self.fetcher.requests_made();
        stats.rate_limited = self.fetcher.rate_limited_responses();
        stats.finish();

        tracing::info!(
            "Run complete: {} new devices, {} candidates, {} dropped",
            stats.persisted,
            stats.candidates,
            stats.dropped()
        );

        Ok(stats)
    }

    /// Lists, extracts and persists one brand
    async fn process_brand(
        &mut self,
        brand: &BrandEntry,
        stats: &mut RunStatistics,
    ) -> Result<(), CatalogError> {
        let mut phase = BrandPhase::Resolving.transition(BrandPhase::Listing)?;
        tracing::info!("Processing brand {} ({})", brand.display_name, phase);

        let filter = ModelFilter::new(self.targets.models_for(&brand.display_name));
        let listing = ModelLinkCollector::new(&self.fetcher, &self.selectors)
            .collect(brand, &self.dedup, &filter)
            .await;

        let total = listing.links.len();
        stats.candidates += total;

        if total == 0 {
            phase.transition(BrandPhase::Done)?;
            stats.brands_skipped += 1;
            tracing::info!("No new models for {}", brand.display_name);
            return Ok(());
        }

        phase = phase.transition(BrandPhase::Extracting { done: 0, total })?;

        let mut writer = open_brand_output(&self.output_dir, &brand.id)?;
        let mut schema = FeatureSchema::new();
        if let Some(header) = writer.header() {
            for column in header.columns() {
                schema.append(column);
            }
        }

        // A new file's header is the union of every candidate's columns, so
        // its records are held until the whole brand has been extracted
        let discover = writer.header().is_none();
        let mut held = Vec::new();

        let extractor = SpecificationExtractor::new(
            &self.fetcher,
            &self.selectors,
            self.config.extraction.policy,
        );

        for (index, link) in listing.links.iter().enumerate() {
            tracing::info!(
                "[{}/{}] {}",
                index + 1,
                total,
                link.derived_name.as_deref().unwrap_or(&link.relative_path)
            );

            match extractor
                .extract(link, &brand.display_name, &mut schema)
                .await
            {
                Extraction::Empty => {
                    stats.empty += 1;
                }
                Extraction::Record(record) if discover => held.push(record),
                Extraction::Record(record) => {
                    persist_record(&mut writer, record, &schema, brand, &mut self.dedup, stats)?;
                }
            }

            phase = phase.transition(BrandPhase::Extracting {
                done: index + 1,
                total,
            })?;
        }

        if !held.is_empty() {
            let schema = FeatureSchema::from_records(&held);
            tracing::info!(
                "Writing {} {} records under a {}-column header",
                held.len(),
                brand.display_name,
                schema.len()
            );
            for record in held {
                persist_record(&mut writer, record, &schema, brand, &mut self.dedup, stats)?;
            }
        }

        phase = phase.transition(BrandPhase::Done)?;
        tracing::info!(
            "Finished brand {} ({}, {} known)",
            brand.display_name,
            phase,
            self.dedup.known_for(&brand.key())
        );

        Ok(())
    }
}

/// Re-checks one record against the dedup index and appends it to the
/// brand's file
///
/// Schema violations are logged and counted; only I/O failures are returned.
fn persist_record(
    writer: &mut IncrementalWriter,
    mut record: DeviceRecord,
    schema: &FeatureSchema,
    brand: &BrandEntry,
    dedup: &mut DedupIndex,
    stats: &mut RunStatistics,
) -> Result<(), CatalogError> {
    let brand_key = brand.key();

    if record.model_name.is_empty() {
        tracing::warn!("Dropping a {} record with no model name", brand.display_name);
        stats.missing_name += 1;
        return Ok(());
    }

    if dedup.contains(&brand_key, &record.model_name) {
        tracing::info!("Already have {}, skipping", record.model_name);
        stats.duplicates += 1;
        return Ok(());
    }

    // Files written without an image column keep their layout
    if let Some(header) = writer.header() {
        if record.image.is_some() && !header.columns().iter().any(|c| c == MODEL_IMAGE_COLUMN) {
            tracing::debug!("{} has no '{}' column", writer.path().display(), MODEL_IMAGE_COLUMN);
            record.image = None;
        }
    }

    match writer.persist(&record, schema) {
        Ok(()) => {
            dedup.record(&brand_key, &record.model_name);
            stats.record_persisted(&brand.display_name);
            tracing::info!(
                "Saved {} to {}",
                record.model_name,
                writer.path().display()
            );
            Ok(())
        }
        Err(OutputError::SchemaViolation { file, model, fields }) => {
            tracing::error!(
                "Schema violation in {}: '{}' has fields outside the header: {:?}",
                file,
                model,
                fields
            );
            stats.schema_violations += 1;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Runs a complete crawl with the configured transport
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `targets` - Brands and models to collect
pub async fn run_crawl(config: Config, targets: TargetList) -> Result<RunStatistics, CatalogError> {
    let mut coordinator = Coordinator::new(config, targets)?;
    coordinator.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ExtractionConfig, ExtractionPolicy, FetcherConfig, InputConfig, OutputConfig,
        SelectorConfig, SiteConfig, TargetSpec, Transport,
    };
    use crate::crawler::source::MirrorSource;
    use tempfile::TempDir;

    const INDEX: &str = r#"<table><tr>
        <td><a href="acme-phones-101.php">Acme<br><span>2 devices</span></a></td>
        <td><a href="zeta-phones-7.php">Zeta<br><span>0 devices</span></a></td>
    </tr></table>"#;

    const LISTING: &str = r#"<div class="section-body"><ul>
        <li><a href="acme_x1-1.php"><strong><span>Acme X1</span></strong></a></li>
        <li><a href="acme_x2-2.php"><strong><span>Acme X2</span></strong></a></li>
    </ul></div>"#;

    const DEVICE_X1: &str = r#"<h1 class="specs-phone-name-title">Acme X1</h1>
        <table><tr><td>Display</td><td>6.1 inch</td></tr></table>"#;

    const DEVICE_X2: &str = r#"<h1 class="specs-phone-name-title">Acme X2</h1>
        <table><tr><td>Display</td><td>6.4 inch</td></tr></table>"#;

    fn write_mirror(dir: &Path) {
        std::fs::write(dir.join("makers.php3"), INDEX).unwrap();
        std::fs::write(dir.join("acme-phones-101.php"), LISTING).unwrap();
        std::fs::write(dir.join("zeta-phones-7.php"), "<div class=\"section-body\"></div>").unwrap();
        std::fs::write(dir.join("acme_x1-1.php"), DEVICE_X1).unwrap();
        std::fs::write(dir.join("acme_x2-2.php"), DEVICE_X2).unwrap();
    }

    fn test_config(mirror: &Path, output: &Path) -> Config {
        let mut fetcher = FetcherConfig::with_defaults(Transport::Mirror);
        fetcher.mirror_dir = Some(mirror.display().to_string());
        fetcher.request_delay_ms = 0;
        fetcher.rate_limit_cooldown_ms = 0;

        Config {
            site: SiteConfig {
                base_url: "https://site.test/".to_string(),
                brand_index_path: "makers.php3".to_string(),
            },
            fetcher,
            extraction: ExtractionConfig {
                policy: ExtractionPolicy::Full,
            },
            input: InputConfig {
                targets_path: "target_devices.csv".to_string(),
            },
            output: OutputConfig {
                directory: output.display().to_string(),
            },
            selectors: SelectorConfig::default(),
        }
    }

    fn targets(brand: &str, models: &[&str]) -> TargetList {
        TargetList::new(vec![TargetSpec {
            brand: brand.to_string(),
            models: models.iter().map(|m| m.to_string()).collect(),
        }])
    }

    #[tokio::test]
    async fn test_run_writes_brand_file() {
        let mirror = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_mirror(mirror.path());

        let config = test_config(mirror.path(), output.path());
        let stats = run_crawl(config, targets("acme", &[])).await.unwrap();

        assert_eq!(stats.brands_resolved, 1);
        assert_eq!(stats.candidates, 2);
        assert_eq!(stats.persisted, 2);
        assert!(stats.finished_at.is_some());

        let content = std::fs::read_to_string(output.path().join("Acme.csv")).unwrap();
        assert_eq!(
            content,
            "Brand,Model Name,Display\nAcme,Acme X1,6.1 inch\nAcme,Acme X2,6.4 inch\n"
        );
    }

    #[tokio::test]
    async fn test_second_run_appends_nothing() {
        let mirror = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_mirror(mirror.path());

        run_crawl(test_config(mirror.path(), output.path()), targets("acme", &[]))
            .await
            .unwrap();
        let first = std::fs::read_to_string(output.path().join("Acme.csv")).unwrap();

        let stats = run_crawl(test_config(mirror.path(), output.path()), targets("acme", &[]))
            .await
            .unwrap();
        let second = std::fs::read_to_string(output.path().join("Acme.csv")).unwrap();

        assert_eq!(stats.persisted, 0);
        assert_eq!(stats.candidates, 0);
        assert_eq!(stats.brands_skipped, 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_model_filter_limits_candidates() {
        let mirror = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_mirror(mirror.path());

        let config = test_config(mirror.path(), output.path());
        let stats = run_crawl(config, targets("acme", &["x2"])).await.unwrap();

        assert_eq!(stats.persisted, 1);
        let content = std::fs::read_to_string(output.path().join("Acme.csv")).unwrap();
        assert!(content.contains("Acme X2"));
        assert!(!content.contains("Acme X1"));
    }

    #[tokio::test]
    async fn test_brand_without_models_writes_no_file() {
        let mirror = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_mirror(mirror.path());

        let config = test_config(mirror.path(), output.path());
        let stats = run_crawl(config, targets("zeta", &[])).await.unwrap();

        assert_eq!(stats.brands_resolved, 1);
        assert_eq!(stats.brands_skipped, 1);
        assert!(!output.path().join("Zeta.csv").exists());
    }

    #[tokio::test]
    async fn test_new_file_header_is_union_of_brand_fields() {
        let mirror = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_mirror(mirror.path());
        std::fs::write(
            mirror.path().join("acme-phones-101.php"),
            r#"<div class="section-body"><ul>
            <li><a href="acme_x1-1.php"><strong><span>Acme X1</span></strong></a></li>
            <li><a href="acme_x2-2.php"><strong><span>Acme X2</span></strong></a></li>
            <li><a href="acme_x3-3.php"><strong><span>Acme X3</span></strong></a></li>
            </ul></div>"#,
        )
        .unwrap();
        std::fs::write(
            mirror.path().join("acme_x2-2.php"),
            r#"<h1 class="specs-phone-name-title">Acme X2</h1>
            <table><tr><td>Display</td><td>6.4 inch</td></tr>
            <tr><td>5G bands</td><td>n78</td></tr></table>"#,
        )
        .unwrap();
        std::fs::write(
            mirror.path().join("acme_x3-3.php"),
            r#"<h1 class="specs-phone-name-title">Acme X3</h1>
            <div class="specs-photo-main"><img src="x3.jpg"></div>
            <table><tr><td>Display</td><td>6.7 inch</td></tr></table>"#,
        )
        .unwrap();

        let stats = run_crawl(test_config(mirror.path(), output.path()), targets("acme", &[]))
            .await
            .unwrap();

        assert_eq!(stats.persisted, 3);
        assert_eq!(stats.schema_violations, 0);
        let content = std::fs::read_to_string(output.path().join("Acme.csv")).unwrap();
        assert_eq!(
            content,
            "Brand,Model Name,Model Image,Display,5G bands\n\
             Acme,Acme X1,,6.1 inch,\n\
             Acme,Acme X2,,6.4 inch,n78\n\
             Acme,Acme X3,x3.jpg,6.7 inch,\n"
        );

        let rerun = run_crawl(test_config(mirror.path(), output.path()), targets("acme", &[]))
            .await
            .unwrap();
        assert_eq!(rerun.candidates, 0);
        assert_eq!(rerun.schema_violations, 0);
    }

    #[tokio::test]
    async fn test_fields_outside_existing_header_are_rejected() {
        let mirror = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_mirror(mirror.path());
        std::fs::write(
            mirror.path().join("acme_x2-2.php"),
            r#"<h1 class="specs-phone-name-title">Acme X2</h1>
            <table><tr><td>Display</td><td>6.4 inch</td></tr>
            <tr><td>Weight</td><td>190 g</td></tr></table>"#,
        )
        .unwrap();
        std::fs::write(
            output.path().join("Acme.csv"),
            "Brand,Model Name,Display\nAcme,Acme X0,5.0 inch\n",
        )
        .unwrap();

        let config = test_config(mirror.path(), output.path());
        let stats = run_crawl(config, targets("acme", &[])).await.unwrap();

        assert_eq!(stats.persisted, 1);
        assert_eq!(stats.schema_violations, 1);
        let content = std::fs::read_to_string(output.path().join("Acme.csv")).unwrap();
        assert_eq!(
            content,
            "Brand,Model Name,Display\nAcme,Acme X0,5.0 inch\nAcme,Acme X1,6.1 inch\n"
        );
    }

    #[tokio::test]
    async fn test_image_left_out_of_existing_header_without_image_column() {
        let mirror = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_mirror(mirror.path());
        std::fs::write(
            mirror.path().join("acme_x1-1.php"),
            r#"<h1 class="specs-phone-name-title">Acme X1</h1>
            <div class="specs-photo-main"><img src="x1.jpg"></div>
            <table><tr><td>Display</td><td>6.1 inch</td></tr></table>"#,
        )
        .unwrap();
        std::fs::write(
            output.path().join("Acme.csv"),
            "Brand,Model Name,Display\nAcme,Acme X0,5.0 inch\n",
        )
        .unwrap();

        let config = test_config(mirror.path(), output.path());
        let stats = run_crawl(config, targets("acme", &[])).await.unwrap();

        assert_eq!(stats.persisted, 2);
        assert_eq!(stats.schema_violations, 0);
        let content = std::fs::read_to_string(output.path().join("Acme.csv")).unwrap();
        assert!(content.starts_with("Brand,Model Name,Display\n"));
        assert!(content.contains("Acme,Acme X1,6.1 inch\n"));
        assert!(!content.contains("x1.jpg"));
    }

    #[tokio::test]
    async fn test_same_title_from_two_links_is_written_once() {
        let mirror = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_mirror(mirror.path());
        std::fs::write(
            mirror.path().join("acme-phones-101.php"),
            r#"<div class="section-body"><ul>
            <li><a href="acme_x1-1.php"><strong><span>Acme X1</span></strong></a></li>
            <li><a href="acme_x1_2023-9.php"><strong><span>Acme X1 (2023)</span></strong></a></li>
            </ul></div>"#,
        )
        .unwrap();
        std::fs::write(mirror.path().join("acme_x1_2023-9.php"), DEVICE_X1).unwrap();

        let config = test_config(mirror.path(), output.path());
        let stats = run_crawl(config, targets("acme", &[])).await.unwrap();

        assert_eq!(stats.candidates, 2);
        assert_eq!(stats.persisted, 1);
        assert_eq!(stats.duplicates, 1);
        let content = std::fs::read_to_string(output.path().join("Acme.csv")).unwrap();
        assert_eq!(content.matches("Acme X1").count(), 1);
        assert_eq!(content, "Brand,Model Name,Display\nAcme,Acme X1,6.1 inch\n");
    }

    #[tokio::test]
    async fn test_missing_device_page_counts_as_empty() {
        let mirror = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_mirror(mirror.path());
        std::fs::remove_file(mirror.path().join("acme_x1-1.php")).unwrap();

        let config = test_config(mirror.path(), output.path());
        let stats = run_crawl(config, targets("acme", &[])).await.unwrap();

        assert_eq!(stats.empty, 1);
        assert_eq!(stats.persisted, 1);
    }

    #[tokio::test]
    async fn test_with_source_seeds_dedup() {
        let mirror = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        std::fs::write(
            output.path().join("Acme.csv"),
            "Brand,Model Name\nAcme,Acme X1\n",
        )
        .unwrap();

        let config = test_config(mirror.path(), output.path());
        let coordinator = Coordinator::with_source(
            config,
            targets("acme", &[]),
            Box::new(MirrorSource::new(mirror.path())),
        )
        .unwrap();

        assert!(coordinator.dedup().contains("acme", "acme x1"));
        assert_eq!(coordinator.output_dir(), output.path());
    }
}
