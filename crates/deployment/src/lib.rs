//! Application state surface. Route handlers depend on the [`Deployment`]
//! trait; [`LocalDeployment`] wires the concrete services together.

use std::sync::Arc;

use db::DBService;
use services::services::{
    ads::AdStudioService,
    billing::BillingService,
    brand_identity::BrandIdentityService,
    business_search::BusinessSearchClient,
    config::Config,
    credits::CreditService,
    gateway::GatewayClient,
    lead_finder::LeadFinderService,
    market_research::MarketResearchService,
    outreach::OutreachService,
    publisher::{DeployClient, PublisherService},
    website_builder::WebsiteBuilderService,
};
use tracing::info;

pub trait Deployment: Clone + Send + Sync + 'static {
    fn db(&self) -> &DBService;
    fn config(&self) -> &Config;
    fn gateway(&self) -> &GatewayClient;
    fn credits(&self) -> &CreditService;
    fn market_research(&self) -> &MarketResearchService;
    fn brand_identity(&self) -> &BrandIdentityService;
    fn website_builder(&self) -> &WebsiteBuilderService;
    fn lead_finder(&self) -> &LeadFinderService;
    fn ad_studio(&self) -> &AdStudioService;
    fn outreach(&self) -> &OutreachService;
    fn publisher(&self) -> &PublisherService;
    fn billing(&self) -> &BillingService;
}

struct Inner {
    db: DBService,
    config: Config,
    gateway: GatewayClient,
    credits: CreditService,
    market_research: MarketResearchService,
    brand_identity: BrandIdentityService,
    website_builder: WebsiteBuilderService,
    lead_finder: LeadFinderService,
    ad_studio: AdStudioService,
    outreach: OutreachService,
    publisher: PublisherService,
    billing: BillingService,
}

#[derive(Clone)]
pub struct LocalDeployment {
    inner: Arc<Inner>,
}

impl LocalDeployment {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let db = DBService::new(&config.database_url).await?;
        let pool = db.pool.clone();

        let gateway = GatewayClient::new(
            config.openrouter_api_key.clone(),
            config.openrouter_base_url.clone(),
        )?;
        let search = BusinessSearchClient::new(
            config.serpapi_key.clone(),
            config.serpapi_base_url.clone(),
        )?;
        let deploy = DeployClient::new(
            config.vercel_token.clone(),
            config.vercel_base_url.clone(),
            config.vercel_team_id.clone(),
        )?;

        let credits = CreditService::new(pool.clone(), config.signup_credit_grant);
        let market_research = MarketResearchService::new(pool.clone(), gateway.clone());
        let brand_identity = BrandIdentityService::new(pool.clone(), gateway.clone());
        let website_builder = WebsiteBuilderService::new(pool.clone(), gateway.clone());
        let lead_finder = LeadFinderService::new(pool.clone(), search);
        let ad_studio = AdStudioService::new(pool.clone(), gateway.clone());
        let outreach = OutreachService::new(pool.clone(), gateway.clone());
        let publisher =
            PublisherService::new(pool.clone(), deploy, config.publish_root_domain.clone());
        let billing = BillingService::new(
            config.stripe_secret_key.clone(),
            config.stripe_webhook_secret.clone(),
            config.stripe_base_url.clone(),
            config.checkout_success_url.clone(),
            config.checkout_cancel_url.clone(),
        )?;

        info!(database_url = %config.database_url, "deployment initialized");

        Ok(Self {
            inner: Arc::new(Inner {
                db,
                config,
                gateway,
                credits,
                market_research,
                brand_identity,
                website_builder,
                lead_finder,
                ad_studio,
                outreach,
                publisher,
                billing,
            }),
        })
    }
}

impl Deployment for LocalDeployment {
    fn db(&self) -> &DBService {
        &self.inner.db
    }

    fn config(&self) -> &Config {
        &self.inner.config
    }

    fn gateway(&self) -> &GatewayClient {
        &self.inner.gateway
    }

    fn credits(&self) -> &CreditService {
        &self.inner.credits
    }

    fn market_research(&self) -> &MarketResearchService {
        &self.inner.market_research
    }

    fn brand_identity(&self) -> &BrandIdentityService {
        &self.inner.brand_identity
    }

    fn website_builder(&self) -> &WebsiteBuilderService {
        &self.inner.website_builder
    }

    fn lead_finder(&self) -> &LeadFinderService {
        &self.inner.lead_finder
    }

    fn ad_studio(&self) -> &AdStudioService {
        &self.inner.ad_studio
    }

    fn outreach(&self) -> &OutreachService {
        &self.inner.outreach
    }

    fn publisher(&self) -> &PublisherService {
        &self.inner.publisher
    }

    fn billing(&self) -> &BillingService {
        &self.inner.billing
    }
}
