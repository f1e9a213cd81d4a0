//! Shared handles every batch needs: the pool, configuration, provider
//! clients and the pluggable scorers.

use std::sync::Arc;

use leadpipe_core::{
    AppConfig, ContactScorer, EnrichmentPricing, HeuristicContactScorer, HeuristicSegmentScorer,
    SegmentScorer,
};
use leadpipe_providers::{
    AdsLibraryClient, EmailVerifierClient, PlacesClient, SiteCrawler, ZipDirectory,
};
use sqlx::PgPool;

use crate::error::PipelineError;

pub struct PipelineContext {
    pool: PgPool,
    config: AppConfig,
    places: Option<PlacesClient>,
    crawler: SiteCrawler,
    verifier: Option<EmailVerifierClient>,
    ads: Option<AdsLibraryClient>,
    zips: ZipDirectory,
    contact_scorer: Arc<dyn ContactScorer>,
    segment_scorer: Arc<dyn SegmentScorer>,
}

impl PipelineContext {
    /// Builds provider clients for every credential present in `config`.
    ///
    /// Missing credentials are not an error here; the stage that needs them
    /// fails with [`PipelineError::Config`] when invoked.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Upstream`] if an HTTP client cannot be built.
    pub fn from_config(pool: PgPool, config: AppConfig) -> Result<Self, PipelineError> {
        let timeout = config.http_timeout_secs;
        let ua = config.user_agent.as_str();

        let places = config
            .places_api_key
            .as_deref()
            .map(|key| PlacesClient::new(key, timeout, ua))
            .transpose()?;
        let verifier = config
            .anymail_api_key
            .as_deref()
            .map(|key| EmailVerifierClient::new(key, timeout, ua))
            .transpose()?;
        let ads = config
            .ads_provider
            .as_ref()
            .map(|provider| AdsLibraryClient::new(provider, timeout, ua))
            .transpose()?;
        let crawler = SiteCrawler::new(timeout, ua)?;
        let zips = ZipDirectory::new(&config.zip_dataset_url, timeout, ua)?;

        Ok(Self {
            pool,
            config,
            places,
            crawler,
            verifier,
            ads,
            zips,
            contact_scorer: Arc::new(HeuristicContactScorer),
            segment_scorer: Arc::new(HeuristicSegmentScorer),
        })
    }

    #[must_use]
    pub fn with_places(mut self, client: PlacesClient) -> Self {
        self.places = Some(client);
        self
    }

    #[must_use]
    pub fn with_verifier(mut self, client: EmailVerifierClient) -> Self {
        self.verifier = Some(client);
        self
    }

    #[must_use]
    pub fn with_ads(mut self, client: AdsLibraryClient) -> Self {
        self.ads = Some(client);
        self
    }

    #[must_use]
    pub fn with_zips(mut self, zips: ZipDirectory) -> Self {
        self.zips = zips;
        self
    }

    /// Swaps in different scoring strategies.
    #[must_use]
    pub fn with_scorers(
        mut self,
        contact_scorer: Arc<dyn ContactScorer>,
        segment_scorer: Arc<dyn SegmentScorer>,
    ) -> Self {
        self.contact_scorer = contact_scorer;
        self.segment_scorer = segment_scorer;
        self
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn crawler(&self) -> &SiteCrawler {
        &self.crawler
    }

    #[must_use]
    pub fn zips(&self) -> &ZipDirectory {
        &self.zips
    }

    #[must_use]
    pub fn contact_scorer(&self) -> &dyn ContactScorer {
        self.contact_scorer.as_ref()
    }

    #[must_use]
    pub fn segment_scorer(&self) -> &dyn SegmentScorer {
        self.segment_scorer.as_ref()
    }

    #[must_use]
    pub fn enrichment_pricing(&self) -> EnrichmentPricing {
        EnrichmentPricing {
            credits_per_lead: self.config.enrichment_lead_credits,
            deep_profile_credits: self.config.enrichment_deep_profile_credits,
            credit_cost_usd: self.config.enrichment_credit_cost_usd,
        }
    }

    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if no Places key is configured.
    pub fn places(&self) -> Result<&PlacesClient, PipelineError> {
        self.places.as_ref().ok_or_else(|| {
            PipelineError::Config("GOOGLE_PLACES_API_KEY is not set".to_string())
        })
    }

    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if no verifier key is configured.
    pub fn verifier(&self) -> Result<&EmailVerifierClient, PipelineError> {
        self.verifier.as_ref().ok_or_else(|| {
            PipelineError::Config("ANYMAIL_SEARCH_API_KEY is not set".to_string())
        })
    }

    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if no ads-library provider is configured.
    pub fn ads(&self) -> Result<&AdsLibraryClient, PipelineError> {
        self.ads.as_ref().ok_or_else(|| {
            PipelineError::Config("ADS_LIBRARY_PROVIDER is not set".to_string())
        })
    }
}
