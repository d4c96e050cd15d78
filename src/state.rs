use std::sync::Arc;

use crate::{
    config::Config, downloader::Downloader, extractor::MediaExtractor, registry::LinkRegistry,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub downloader: Arc<Downloader>,
    pub links: Arc<LinkRegistry>,
}

impl AppState {
    pub fn new(config: Config, extractor: Arc<dyn MediaExtractor>) -> Self {
        let downloader = Downloader::new(extractor, &config);
        let links = LinkRegistry::new(config.link_ttl_seconds, config.link_max_entries);

        Self {
            config: Arc::new(config),
            downloader: Arc::new(downloader),
            links: Arc::new(links),
        }
    }
}
