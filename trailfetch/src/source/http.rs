use std::path::Path;

use futures::future::TryFutureExt;
use futures::stream::{Stream, TryStreamExt};
use reqwest::{Client, IntoUrl};
use tokio::{fs, io};
use url::Url;

use super::Transfer;
use crate::{Error, Result};

/// An HTTP object source, resolving keys against a base URL (bucket website, mirror, ...).
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    base: Url,
}

impl HttpSource {
    pub fn new(base: impl IntoUrl) -> Result<Self> {
        let mut base = base.into_url()?;

        // make sure keys are resolved below the base path instead of replacing its last segment
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }

        Ok(Self {
            client: Client::default(),
            base,
        })
    }

    #[inline]
    pub fn with_client(self, client: Client) -> Self {
        Self { client, ..self }
    }

    #[inline]
    pub fn base(&self) -> &Url {
        &self.base
    }

    fn url(&self, key: &str) -> Result<Url> {
        Ok(self.base.join(key.trim_start_matches('/'))?)
    }

    fn stream(&self, url: Url) -> impl Stream<Item = Result<bytes::Bytes>> {
        self.client
            .get(url.clone())
            .send()
            .err_into::<Error>()
            .and_then(|resp| async move {
                match resp.status() {
                    status if status.is_success() => Ok(resp.bytes_stream().err_into::<Error>()),
                    status => Err(Error::Status { status, url }),
                }
            })
            .try_flatten_stream()
    }
}

impl Transfer for HttpSource {
    async fn fetch(&self, key: &str, path: &Path) -> Result<()> {
        use io::AsyncWriteExt;

        let url = self.url(key)?;

        tracing::trace!("Fetching `{url}` to `{}`", path.display());

        let file = fs::File::create(path).await?;
        let mut writer = io::BufWriter::new(file);
        let mut stream = std::pin::pin!(self.stream(url));

        while let Some(chunk) = stream.try_next().await? {
            writer.write_all(&chunk).await?;
        }

        writer.shutdown().await?;
        writer.into_inner().sync_all().await?;

        Ok(())
    }
}
