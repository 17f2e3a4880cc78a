#![cfg_attr(not(feature = "serial"), allow(dead_code))]

#[cfg(feature = "serial")]
use std::env;

#[cfg(feature = "serial")]
use crow_serial::{Command, CrowAdmin, Host, SharedPort};

#[cfg(feature = "serial")]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Show info and higher levels by default, allow overriding via RUST_LOG.
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let port_name = env::args()
        .nth(1)
        .ok_or("please provide the serial port name as a command line argument")?;
    let address: u8 = match env::args().nth(2) {
        Some(text) => text.parse()?,
        None => 1,
    };

    let link = SharedPort::open(&port_name)?;
    let mut host = Host::new(link);

    #[cfg(feature = "config")]
    {
        let config = crow_serial::HostConfig::from_file_or_default("crow.json");
        host.set_settings_table(config.settings_table());
    }

    println!("Crow host demonstration on {}, address {}\n", port_name, address);

    let mut admin = CrowAdmin::new(&mut host, address);

    println!("Pinging the admin service...");
    let elapsed = admin.ping()?;
    println!("  round trip: {:.3} ms\n", elapsed.as_secs_f64() * 1e3);

    println!("Fetching device info...");
    let info = admin.get_device_info()?;
    println!("  crow version: {}", info.crow_version);
    println!("  admin version: {}", info.admin_version);
    println!("  max command size: {}", info.max_command_size);
    println!("  max response size: {}", info.max_response_size);
    if let Some(identifier) = &info.impl_identifier {
        println!("  implementation: {}", identifier);
    }
    if let Some(identifier) = &info.device_identifier {
        println!("  device: {}", identifier);
    }
    println!();

    println!("Listing open ports...");
    let ports = admin.get_open_ports()?;
    println!("  open ports: {:?}\n", ports);

    println!("Echoing through the admin service...");
    admin.echo(b"Hello there! echo echo echo")?;
    println!("  echo verified\n");

    println!("Sending a user ping...");
    let transaction = host.send_command(&Command {
        address,
        port: 0,
        ..Default::default()
    })?;
    match transaction.response {
        Some(payload) if payload.is_empty() => println!("  empty response, as expected"),
        Some(payload) => println!("  response: {:02x?}", payload),
        None => println!("  no response expected"),
    }

    Ok(())
}

#[cfg(not(feature = "serial"))]
fn main() {
    eprintln!("This binary requires the 'serial' feature to be enabled.");
    eprintln!("Please build with: cargo build --features serial");
    std::process::exit(1);
}
