use core::fmt::Write;

use embassy_net::{
    Stack,
    dns::DnsSocket,
    tcp::client::{TcpClient, TcpClientState},
};
use embassy_time::{Duration as EmbassyDuration, WithTimeout};
use heapless::String as HeaplessString;
use log::{info, warn};
use plantlink_core::{device::SinkError, publish::wire};
use plantlink_hal_esp32::{
    cloud::{
        self, CloudOutcome, CloudRequest, OFFLINE, OutcomeChannel, RequestChannel,
        TRANSPORT_FAILED,
    },
    network::ConnectivityHandle,
};
use reqwless::{
    client::{HttpClient, TlsConfig, TlsVerify},
    request::{Method, RequestBuilder},
};
use static_cell::StaticCell;

const TCP_BUFFER_BYTES: usize = 4_096;
/// Largest TLS record plus overhead.
const TLS_BUFFER_BYTES: usize = 16_640;
const RESPONSE_BYTES: usize = 2_048;
const BEARER_BYTES: usize = 512;
const REQUEST_TIMEOUT_SECS: u64 = 20;

type Tcp<'n> = TcpClient<'n, 1, TCP_BUFFER_BYTES, TCP_BUFFER_BYTES>;
type Client<'a, 'n> = HttpClient<'a, Tcp<'n>, DnsSocket<'n>>;

static TCP_STATE: StaticCell<TcpClientState<1, TCP_BUFFER_BYTES, TCP_BUFFER_BYTES>> =
    StaticCell::new();
static TLS_READ: StaticCell<[u8; TLS_BUFFER_BYTES]> = StaticCell::new();
static TLS_WRITE: StaticCell<[u8; TLS_BUFFER_BYTES]> = StaticCell::new();
static RESPONSE: StaticCell<[u8; RESPONSE_BYTES]> = StaticCell::new();

#[derive(Clone, Copy, Debug)]
pub struct CloudCredentials {
    pub db_host: &'static str,
    pub db_secret: &'static str,
    pub sheet_id: &'static str,
    pub sheets_token: &'static str,
}

#[derive(Debug)]
enum UplinkError {
    Url,
    Http(reqwless::Error),
    Timeout,
}

/// Sends queued cloud writes one at a time and reports each result.
pub async fn uplink_loop(
    stack: Stack<'static>,
    connectivity: &'static ConnectivityHandle,
    requests: &'static RequestChannel,
    outcomes: &'static OutcomeChannel,
    credentials: CloudCredentials,
    tls_seed: u64,
) -> ! {
    let tcp_client = TcpClient::new(stack, TCP_STATE.init(TcpClientState::new()));
    let dns_client = DnsSocket::new(stack);
    let tls = TlsConfig::new(
        tls_seed,
        TLS_READ.init([0; TLS_BUFFER_BYTES]),
        TLS_WRITE.init([0; TLS_BUFFER_BYTES]),
        TlsVerify::None,
    );
    let mut client = HttpClient::new_with_tls(&tcp_client, &dns_client, tls);
    let response_buffer = RESPONSE.init([0; RESPONSE_BYTES]);

    let mut bearer = HeaplessString::<BEARER_BYTES>::new();
    if write!(bearer, "Bearer {}", credentials.sheets_token).is_err() {
        warn!("uplink: sheets token too long; appends will be rejected");
    }

    loop {
        let request = requests.receive().await;
        let task = request.task();

        let outcome = if !connectivity.snapshot().online() {
            CloudOutcome::Failed {
                task,
                error: SinkError::new(OFFLINE, "offline"),
            }
        } else {
            match send(&mut client, &credentials, &bearer, &request, response_buffer).await {
                Ok(status) if (200..300).contains(&status) => {
                    info!("uplink: {} {} status={}", task, request.target(), status);
                    CloudOutcome::Done { task, status }
                }
                Ok(status) => CloudOutcome::Failed {
                    task,
                    error: SinkError::new(i32::from(status), "http error status"),
                },
                Err(err) => {
                    warn!("uplink: {} {} failed: {:?}", task, request.target(), err);
                    CloudOutcome::Failed {
                        task,
                        error: SinkError::new(TRANSPORT_FAILED, transport_reason(&err)),
                    }
                }
            }
        };

        cloud::report(outcomes, outcome);
    }
}

async fn send(
    client: &mut Client<'_, '_>,
    credentials: &CloudCredentials,
    bearer: &str,
    request: &CloudRequest,
    response_buffer: &mut [u8],
) -> Result<u16, UplinkError> {
    let (method, url, body, auth) = match request {
        CloudRequest::Put { path, body } => (
            Method::PUT,
            wire::kv_url(credentials.db_host, path, credentials.db_secret)
                .map_err(|_| UplinkError::Url)?,
            body.as_bytes(),
            None,
        ),
        CloudRequest::Append { range, body } => (
            Method::POST,
            wire::append_url(credentials.sheet_id, range).map_err(|_| UplinkError::Url)?,
            body.as_bytes(),
            Some(bearer),
        ),
    };

    let exchange = async {
        let handle = client
            .request(method, &url)
            .await
            .map_err(UplinkError::Http)?;

        let json = ("Content-Type", "application/json");
        let with_auth;
        let headers: &[(&str, &str)] = match auth {
            Some(token) => {
                with_auth = [json, ("Authorization", token)];
                &with_auth
            }
            None => core::slice::from_ref(&json),
        };

        let mut handle = handle.headers(headers).body(body);
        let response = handle
            .send(response_buffer)
            .await
            .map_err(UplinkError::Http)?;
        Ok::<u16, UplinkError>(response.status.0)
    };

    exchange
        .with_timeout(EmbassyDuration::from_secs(REQUEST_TIMEOUT_SECS))
        .await
        .map_err(|_| UplinkError::Timeout)?
}

fn transport_reason(err: &UplinkError) -> &'static str {
    match err {
        UplinkError::Url => "url too long",
        UplinkError::Http(reqwless::Error::Dns) => "dns lookup failed",
        UplinkError::Http(reqwless::Error::Tls(_)) => "tls handshake failed",
        UplinkError::Http(_) => "http transport error",
        UplinkError::Timeout => "request timed out",
    }
}
