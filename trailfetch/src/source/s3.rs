use std::path::Path;

use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::Client;
use tokio::{fs, io};

use super::{ListObjects, Transfer};
use crate::config::Credentials;
use crate::paginate::Page;
use crate::{Error, Result};

/// An S3 bucket source.
#[derive(Debug, Clone)]
pub struct S3Source {
    client: Client,
    bucket: String,
}

impl S3Source {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Connect to `bucket` in `region` with a static credential bundle.
    pub async fn connect(credentials: &Credentials, region: impl Into<String>, bucket: impl Into<String>) -> Self {
        let credentials = aws_credential_types::Credentials::new(
            &credentials.access_key_id,
            &credentials.secret_access_key,
            credentials.session_token.clone(),
            None,
            "trailfetch",
        );

        let config = aws_config::defaults(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region.into()))
            .load()
            .await;

        Self::new(Client::new(&config), bucket)
    }

    #[inline]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

impl ListObjects for S3Source {
    async fn list_page(&self, prefix: &str, token: Option<String>) -> Result<Page<String>> {
        let resp = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .set_continuation_token(token)
            .send()
            .await
            .map_err(|err| Error::provider(aws_sdk_s3::Error::from(err)))?;

        let keys = resp
            .contents()
            .iter()
            .filter_map(|object| object.key())
            .filter(|key| !key.ends_with('/'))
            .map(str::to_owned)
            .collect();

        let next_token = match resp.is_truncated() {
            Some(true) => resp.next_continuation_token().map(str::to_owned),
            _ => None,
        };

        Ok(Page::new(keys, next_token))
    }
}

impl Transfer for S3Source {
    async fn fetch(&self, key: &str, path: &Path) -> Result<()> {
        use io::AsyncWriteExt;

        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| Error::provider(aws_sdk_s3::Error::from(err)))?;

        let file = fs::File::create(path).await?;
        let mut writer = io::BufWriter::new(file);
        let mut body = resp.body;

        while let Some(chunk) = body.try_next().await.map_err(Error::provider)? {
            writer.write_all(&chunk).await?;
        }

        writer.shutdown().await?;
        writer.into_inner().sync_all().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use aws_sdk_s3::config::Credentials;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::paginate::paginate;

    const BUCKET: &str = "trails";
    const PREFIX: &str = "AWSLogs/123/CloudTrail/eu-west-1/2024/01/02/";

    fn source(server: &MockServer) -> S3Source {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("eu-west-1"))
            .credentials_provider(Credentials::new("AKID", "SECRET", None, None, "test"))
            .endpoint_url(server.uri())
            .force_path_style(true)
            .build();

        S3Source::new(Client::from_conf(config), BUCKET)
    }

    fn listing(keys: &[&str], truncated: bool, token: &str) -> ResponseTemplate {
        let contents: String = keys
            .iter()
            .map(|key| format!("<Contents><Key>{key}</Key><Size>3</Size></Contents>"))
            .collect();

        let body = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
<Name>{BUCKET}</Name><Prefix>{PREFIX}</Prefix><KeyCount>{}</KeyCount><MaxKeys>1000</MaxKeys>
<IsTruncated>{truncated}</IsTruncated><NextContinuationToken>{token}</NextContinuationToken>
{contents}
</ListBucketResult>"#,
            keys.len()
        );

        ResponseTemplate::new(200).set_body_raw(body, "application/xml")
    }

    #[tokio::test]
    async fn test_list_pages() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("/{BUCKET}")))
            .and(query_param("list-type", "2"))
            .and(query_param_is_missing("continuation-token"))
            .respond_with(listing(&[format!("{PREFIX}a.json.gz").as_str(), PREFIX], true, "page-2"))
            .expect(2)
            .mount(&server)
            .await;

        // a non truncated page ends the listing, whatever its token
        Mock::given(method("GET"))
            .and(path(format!("/{BUCKET}")))
            .and(query_param("list-type", "2"))
            .and(query_param("continuation-token", "page-2"))
            .respond_with(listing(&[format!("{PREFIX}b.json.gz").as_str()], false, "page-3"))
            .expect(2)
            .mount(&server)
            .await;

        let source = source(&server);

        let page = source.list_page(PREFIX, None).await.unwrap();
        assert_eq!(page.items, [format!("{PREFIX}a.json.gz")]);
        assert_eq!(page.next_token.as_deref(), Some("page-2"));

        let page = source.list_page(PREFIX, Some("page-2".to_owned())).await.unwrap();
        assert_eq!(page.items, [format!("{PREFIX}b.json.gz")]);
        assert_eq!(page.next_token, None);

        let keys = paginate(|token| source.list_page(PREFIX, token)).await.unwrap();
        assert_eq!(keys, [format!("{PREFIX}a.json.gz"), format!("{PREFIX}b.json.gz")]);
    }

    #[tokio::test]
    async fn test_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/{BUCKET}/{PREFIX}a.json.gz")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.json.gz");

        source(&server).fetch(&format!("{PREFIX}a.json.gz"), &dest).await.unwrap();

        assert_eq!(fs::read(&dest).await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_fetch_missing_object() {
        let server = MockServer::start().await;
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message></Error>"#;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_raw(body, "application/xml"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("gone.json.gz");

        let err = source(&server).fetch(&format!("{PREFIX}gone.json.gz"), &dest).await.unwrap_err();

        assert!(matches!(err, Error::Source(_)));
        assert!(!dest.exists());
    }
}
