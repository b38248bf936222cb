use bytes::Bytes;
use futures::StreamExt;
use pctl_portainer::ByteStream;

#[tokio::test]
async fn chunks_arrive_in_order() {
    let (sender, stream) = ByteStream::channel(4);

    tokio::spawn(async move {
        sender.send(Bytes::from_static(b"hello ")).await;
        sender.send(Bytes::from_static(b"world")).await;
    });

    let collected = stream.collect().await.unwrap();
    assert_eq!(collected, b"hello world");
}

#[tokio::test]
async fn from_bytes_yields_single_chunk() {
    let mut stream = ByteStream::from_bytes("payload");

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(&first[..], b"payload");
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn producer_error_terminates_the_stream() {
    let (sender, stream) = ByteStream::channel(4);

    tokio::spawn(async move {
        sender.send(Bytes::from_static(b"partial")).await;
        sender
            .fail(std::io::Error::other("tar producer failed"))
            .await;
    });

    let result = stream.collect().await;
    let err = result.unwrap_err();
    assert!(err.to_string().contains("tar producer failed"));
}

#[tokio::test]
async fn blocking_producer_interoperates() {
    let (sender, stream) = ByteStream::channel(2);

    let producer = tokio::task::spawn_blocking(move || {
        for chunk in [&b"a"[..], b"b", b"c"] {
            assert!(sender.blocking_send(Bytes::copy_from_slice(chunk)));
        }
    });

    let collected = stream.collect().await.unwrap();
    producer.await.unwrap();
    assert_eq!(collected, b"abc");
}

#[tokio::test]
async fn send_reports_consumer_gone() {
    let (sender, stream) = ByteStream::channel(1);
    drop(stream);

    assert!(!sender.send(Bytes::from_static(b"x")).await);
}
