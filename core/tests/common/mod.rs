#![allow(dead_code)]

use std::net::SocketAddr;

use gateway_core::{GatewayClient, Provider, ProviderOptions};

/// Start the mock gateway on a random port in a background thread.
pub fn spawn_gateway() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_gateway::run(listener).await
        })
        .unwrap();
    });

    addr
}

pub fn provider_for(addr: SocketAddr) -> Provider {
    Provider::from_options(ProviderOptions {
        host: Some(addr.ip().to_string()),
        port: Some(addr.port()),
        ..ProviderOptions::default()
    })
    .unwrap()
}

pub fn client_for(addr: SocketAddr) -> GatewayClient {
    GatewayClient::new(provider_for(addr)).unwrap()
}
