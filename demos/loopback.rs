use datachan_core::{DataChannelConfig, DecryptStatus, PacketBuf, SessionStats};
use datachan_crypto::{EngineFactory, RekeyType, RustCryptoFactory, SessionInstance, StaticKey};
use std::time::{SystemTime, UNIX_EPOCH};

fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

fn install(inst: &mut SessionInstance, tx: &StaticKey, rx: &StaticKey) -> Result<(), Box<dyn std::error::Error>> {
    inst.init_encrypt_cipher(tx)?;
    inst.init_encrypt_hmac(tx)?;
    inst.init_decrypt_cipher(rx)?;
    inst.init_decrypt_hmac(rx)?;
    inst.rekey(RekeyType::ActivatePrimary)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    // Optional TOML path as the first argument; defaults otherwise.
    let config = match std::env::args().nth(1) {
        Some(path) => DataChannelConfig::from_file(path)?,
        None => DataChannelConfig::default(),
    };

    let ctx = RustCryptoFactory::new().from_config(&config)?;
    tracing::info!("loopback: {}", ctx.options_string());
    let stats = SessionStats::new();

    let mut client = ctx.new_obj(0)?;
    let mut server = ctx.new_obj(0)?;
    client.init_pid_from_config(&config, "client", 0, stats.clone())?;
    server.init_pid_from_config(&config, "server", 0, stats.clone())?;

    let (c2s, s2c) = (StaticKey::random(128), StaticKey::random(128));
    install(&mut client, &c2s, &s2c)?;
    install(&mut server, &s2c, &c2s)?;

    let room = ctx.encap_overhead();
    for round in 0..3u32 {
        let message = format!("ping #{}", round);
        let mut buf = PacketBuf::with_payload(room, message.as_bytes(), room);
        client.encrypt(&mut buf, now())?;
        println!("client -> server: {} bytes on the wire", buf.len());

        match server.decrypt(&mut buf, now()) {
            DecryptStatus::Success => println!("server got: {}", String::from_utf8_lossy(buf.as_slice())),
            status => println!("server dropped packet: {:?}", status),
        }

        // Rotate keys after the second packet.
        if round == 1 {
            let (c2s, s2c) = (StaticKey::random(128), StaticKey::random(128));
            install(&mut client, &c2s, &s2c)?;
            install(&mut server, &s2c, &c2s)?;
            client.rekey(RekeyType::PromoteSecondaryToPrimary)?;
            server.rekey(RekeyType::PromoteSecondaryToPrimary)?;
            server.rekey(RekeyType::DeactivateSecondary)?;
            client.rekey(RekeyType::DeactivateSecondary)?;
        }
    }

    for (name, value) in stats.snapshot() {
        println!("{:>22}: {}", name, value);
    }
    Ok(())
}
