//! Raw bidirectional byte splice for `CONNECT` targets outside the MITM
//! allow-list ("splice raw bytes bidirectionally (transparent
//! tunnel) without decrypting").

use tokio::io::{copy_bidirectional, AsyncRead, AsyncWrite};

/// Copies bytes between `client` and `upstream` until either side closes or
/// errors. Returns the byte counts in each direction for logging.
pub async fn splice<A, B>(mut client: A, mut upstream: B) -> std::io::Result<(u64, u64)>
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    copy_bidirectional(&mut client, &mut upstream).await
}
