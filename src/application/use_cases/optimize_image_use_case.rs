//! Image optimization use case.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, error, info};

use crate::application::services::{
    CacheStats, MetadataManager, NegativeResultCache, ObjectCache, RequestCoalescer, Transcoder,
    classifier,
};
use crate::domain::{
    ImageMetadata, LogicalRequest, OptimizedImage, ProxyError, ProxyResult, UpstreamFetcherPort,
};

/// The uncoalesced work for one logical request.
struct Pipeline {
    fetcher: Arc<dyn UpstreamFetcherPort>,
    objects: ObjectCache,
    metadata: Arc<MetadataManager>,
    transcoder: Arc<Transcoder>,
}

impl Pipeline {
    async fn run(&self, request: LogicalRequest) -> ProxyResult<OptimizedImage> {
        if let Some(data) = self.objects.lookup(&request).await? {
            return self.from_cache(&request, data).await;
        }

        let source = self.fetcher.fetch(&request.source_url).await?;
        debug!(url = %request.source_url, size = source.len(), "Fetched source image");

        let transcoder = Arc::clone(&self.transcoder);
        let input = source.clone();
        let (quality, width, height) = (request.quality, request.width, request.height);
        let transcoded =
            tokio::task::spawn_blocking(move || transcoder.optimize(&input, quality, width, height))
                .await
                .map_err(transcode_join_error)?
                .inspect_err(|e| {
                    error!(url = %request.source_url, error = %e, "Failed to optimize image");
                })?;

        self.objects
            .store(&request, transcoded.data.clone())
            .await;

        let metadata = ImageMetadata::for_payload(
            request.source_url.as_str(),
            ObjectCache::hash_for(&request),
            &transcoded.data,
            transcoded.original_mime,
            source.len() as u64,
            transcoded.optimized_mime,
        );
        self.metadata.persist_tolerant(&metadata).await;

        info!(
            url = %request.source_url,
            original = metadata.original_size,
            optimized = metadata.optimized_size,
            ratio = %metadata.compression_ratio_label(),
            "Optimized image"
        );
        Ok(OptimizedImage {
            data: transcoded.data,
            metadata,
            cache_hit: false,
        })
    }

    async fn from_cache(&self, request: &LogicalRequest, data: Bytes) -> ProxyResult<OptimizedImage> {
        let hash = ObjectCache::hash_for(request);
        let metadata = match self.metadata.retrieve(&hash).await {
            Ok(Some(metadata)) => metadata,
            Ok(None) => {
                debug!(hash = %hash, "Cached object has no metadata, reconstructing");
                let mime = classifier::sniff(&data).mime_type().to_string();
                ImageMetadata::reconstructed(request.source_url.as_str(), hash, &data, mime)
            }
            Err(e) => {
                return Err(ProxyError::MetadataRead {
                    message: e.to_string(),
                });
            }
        };
        Ok(OptimizedImage {
            data,
            metadata,
            cache_hit: true,
        })
    }
}

/// Serves a [`LogicalRequest`] from cache, or fetches and optimizes it.
///
/// Concurrent identical requests share one execution; failures of that
/// execution are remembered for a short while.
pub struct OptimizeImageUseCase {
    pipeline: Arc<Pipeline>,
    coalescer: RequestCoalescer<OptimizedImage>,
    negative_cache: Arc<NegativeResultCache>,
}

impl OptimizeImageUseCase {
    /// Creates new use case.
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn UpstreamFetcherPort>,
        objects: ObjectCache,
        metadata: Arc<MetadataManager>,
        transcoder: Arc<Transcoder>,
        negative_cache: Arc<NegativeResultCache>,
    ) -> Self {
        Self {
            pipeline: Arc::new(Pipeline {
                fetcher,
                objects,
                metadata,
                transcoder,
            }),
            coalescer: RequestCoalescer::new(),
            negative_cache,
        }
    }

    /// Produces the optimized image for `request`.
    ///
    /// # Errors
    /// Returns a remembered failure, or the failure of the shared execution.
    pub async fn execute(&self, request: LogicalRequest) -> ProxyResult<OptimizedImage> {
        let key = request.cache_key();
        if let Some(err) = self.negative_cache.get(&key) {
            debug!(key = %key, "Serving remembered failure");
            return Err(err);
        }

        let pipeline = Arc::clone(&self.pipeline);
        let negative_cache = Arc::clone(&self.negative_cache);
        let coalescing_key = key.as_str().to_string();
        self.coalescer
            .execute(&coalescing_key, move || async move {
                let result = pipeline.run(request).await;
                if let Err(e) = &result {
                    negative_cache.set(&key, e.clone());
                }
                result
            })
            .await
    }

    /// Number of requests currently executing.
    pub fn in_flight_count(&self) -> usize {
        self.coalescer.in_flight_count()
    }

    /// Number of remembered failures.
    pub fn negative_cache_len(&self) -> usize {
        self.negative_cache.len()
    }

    /// Metadata LRU statistics.
    #[must_use]
    pub fn metadata_stats(&self) -> CacheStats {
        self.pipeline.metadata.cache_stats()
    }
}

/// Codec panics count as transcode failures. Cancellation stays internal.
fn transcode_join_error(e: tokio::task::JoinError) -> ProxyError {
    if e.is_panic() {
        ProxyError::transcode("image codec panicked")
    } else {
        ProxyError::internal(format!("transcode task failed: {e}"))
    }
}
