//! BlobBucketClient 经由 ReqwestTransport 访问 HTTP 模拟服务的集成测试

use blobx::{
    BlobBucketClient, BlobBucketClientConfig, BlobError, ListQuery, TypeOptions, WriteOptions,
    WriteSource,
};
use bytes::Bytes;
use futures::stream;
use mockito::Matcher;
use tokio_util::io::StreamReader;

fn client_for(server: &mockito::Server, transport: TypeOptions) -> BlobBucketClient {
    BlobBucketClient::new(BlobBucketClientConfig {
        bucket: "pets".to_string(),
        endpoint: server.url(),
        transport,
        ..Default::default()
    })
    .unwrap()
}

fn bearer_transport() -> TypeOptions {
    TypeOptions::from_json(
        r#"{
            type: "ReqwestTransport",
            options: { bearer_token: "secret", connect_timeout: "2s" }
        }"#,
    )
    .unwrap()
}

#[tokio::test]
async fn test_stat_sends_bearer_token() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/storage/v1/b/pets/o/cat.png")
        .match_header("authorization", "Bearer secret")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "kind": "storage#object",
                "name": "cat.png",
                "bucket": "pets",
                "size": "1024",
                "contentType": "image/png",
                "md5Hash": "sQqNsWTgdUEFt6mb5y4/5Q=="
            }"#,
        )
        .create_async()
        .await;

    let client = client_for(&server, bearer_transport());
    let object = client.stat("cat.png").await.unwrap();

    assert_eq!(object.size, 1024);
    assert_eq!(object.content_type.as_deref(), Some("image/png"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_write_sends_multipart_upload() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/upload/storage/v1/b/pets/o")
        .match_query(Matcher::UrlEncoded(
            "uploadType".to_string(),
            "multipart".to_string(),
        ))
        .match_header(
            "content-type",
            Matcher::Regex("^multipart/related; boundary=[A-Za-z0-9]+$".to_string()),
        )
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#""name":"hello.txt""#.to_string()),
            Matcher::Regex("Content-Type: text/plain\r\n\r\nHello World\r\n".to_string()),
        ]))
        .with_status(200)
        .with_body(
            r#"{"name":"hello.txt","bucket":"pets","size":"11","md5Hash":"sQqNsWTgdUEFt6mb5y4/5Q=="}"#,
        )
        .create_async()
        .await;

    let client = client_for(&server, bearer_transport());
    let object = client
        .write(
            "hello.txt",
            WriteSource::buffer("Hello World"),
            WriteOptions::default().with_content_type("text/plain"),
        )
        .await
        .unwrap();

    assert_eq!(object.size, 11);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_write_checksum_mismatch_deletes_object() {
    let mut server = mockito::Server::new_async().await;
    let _upload = server
        .mock("POST", "/upload/storage/v1/b/pets/o")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"name":"hello.txt","size":"11","md5Hash":"AAAAAAAAAAAAAAAAAAAAAA=="}"#)
        .create_async()
        .await;
    let delete = server
        .mock("DELETE", "/storage/v1/b/pets/o/hello.txt")
        .with_status(204)
        .create_async()
        .await;

    let client = client_for(&server, TypeOptions::of("ReqwestTransport"));
    let result = client
        .write("hello.txt", WriteSource::buffer("Hello World"), WriteOptions::default())
        .await;

    assert!(matches!(result, Err(BlobError::ChecksumMismatch { .. })));
    delete.assert_async().await;
}

#[tokio::test]
async fn test_write_failing_source_discards_acknowledged_upload() {
    let mut server = mockito::Server::new_async().await;
    // 服务端对中断的请求体仍然回应成功
    let _upload = server
        .mock("POST", "/upload/storage/v1/b/pets/o")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"name":"broken.txt","size":"7"}"#)
        .create_async()
        .await;
    let delete = server
        .mock("DELETE", "/storage/v1/b/pets/o/broken.txt")
        .with_status(204)
        .create_async()
        .await;

    let chunks: Vec<std::io::Result<Bytes>> = vec![
        Ok(Bytes::from("partial")),
        Err(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "producer went away",
        )),
    ];
    let reader = StreamReader::new(stream::iter(chunks));

    let client = client_for(&server, TypeOptions::of("ReqwestTransport"));
    let err = client
        .write("broken.txt", WriteSource::stream(reader), WriteOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, BlobError::Stream { .. }));
    assert_eq!(err.to_string(), "数据流错误: 读取数据流失败");
    let cause = std::error::Error::source(&err)
        .and_then(|e| e.downcast_ref::<std::io::Error>())
        .expect("source should be the reader's io error");
    assert_eq!(cause.kind(), std::io::ErrorKind::BrokenPipe);
    assert!(cause.to_string().contains("producer went away"));
    delete.assert_async().await;
}

#[tokio::test]
async fn test_read_gzip_stored_object_skips_hash_check() {
    let mut server = mockito::Server::new_async().await;
    // 摘要对应压缩后的存储内容，返回的是解压后的内容
    let _mock = server
        .mock("GET", "/storage/v1/b/pets/o/log.txt")
        .match_query(Matcher::UrlEncoded("alt".to_string(), "media".to_string()))
        .with_status(200)
        .with_header("x-goog-stored-content-encoding", "gzip")
        .with_header("x-goog-hash", "crc32c=AAAAAA==,md5=AAAAAAAAAAAAAAAAAAAAAA==")
        .with_body("Hello World")
        .create_async()
        .await;

    let client = client_for(&server, TypeOptions::of("ReqwestTransport"));
    let data = client.create_read_stream("log.txt").bytes().await.unwrap();
    assert_eq!(data, Bytes::from("Hello World"));
}

#[tokio::test]
async fn test_read_stream_verifies_hash_header() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/storage/v1/b/pets/o/hello.txt")
        .match_query(Matcher::UrlEncoded("alt".to_string(), "media".to_string()))
        .with_status(200)
        .with_header("x-goog-hash", "crc32c=AAAAAA==,md5=sQqNsWTgdUEFt6mb5y4/5Q==")
        .with_body("Hello World")
        .create_async()
        .await;

    let client = client_for(&server, TypeOptions::of("ReqwestTransport"));
    let data = client.create_read_stream("hello.txt").bytes().await.unwrap();
    assert_eq!(data, Bytes::from("Hello World"));
}

#[tokio::test]
async fn test_remove_missing_object_is_not_found() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("DELETE", "/storage/v1/b/pets/o/gone.txt")
        .with_status(404)
        .with_body(r#"{"error":{"code":404,"message":"No such object: pets/gone.txt"}}"#)
        .create_async()
        .await;

    let client = client_for(&server, TypeOptions::of("ReqwestTransport"));
    match client.remove("gone.txt").await {
        Err(BlobError::NotFound { name }) => assert_eq!(name, "gone.txt"),
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_list_passes_query_and_returns_token() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/storage/v1/b/pets/o")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("maxResults".to_string(), "2".to_string()),
            Matcher::UrlEncoded("prefix".to_string(), "logs/".to_string()),
        ]))
        .with_status(200)
        .with_body(
            r#"{
                "kind": "storage#objects",
                "items": [
                    { "name": "logs/a", "size": "1" },
                    { "name": "logs/b", "size": "2" }
                ],
                "nextPageToken": "CgZsb2dzL2I="
            }"#,
        )
        .create_async()
        .await;

    let client = client_for(&server, TypeOptions::of("ReqwestTransport"));
    let result = client
        .list(ListQuery::default().with_max_results(2).with_prefix("logs/"))
        .await
        .unwrap();

    assert_eq!(result.objects.len(), 2);
    let next = result.next_query.unwrap();
    assert_eq!(next.page_token.unwrap().as_str(), "CgZsb2dzL2I=");
    assert_eq!(next.prefix.as_deref(), Some("logs/"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_server_error_maps_to_store_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/storage/v1/b/pets/o/a.txt")
        .with_status(503)
        .with_body(r#"{"error":{"code":503,"message":"Backend unavailable"}}"#)
        .create_async()
        .await;

    // 经由 TracingTransport 包装，行为不变
    let transport = TypeOptions::from_json(
        r#"{
            type: "TracingTransport",
            options: {
                transport: { type: "ReqwestTransport" },
                slow_threshold: "1ms"
            }
        }"#,
    )
    .unwrap();
    let client = client_for(&server, transport);

    match client.stat("a.txt").await {
        Err(BlobError::Store {
            status, message, ..
        }) => {
            assert_eq!(status, Some(503));
            assert_eq!(message, "Backend unavailable");
        }
        other => panic!("expected store error, got {:?}", other),
    }
}
