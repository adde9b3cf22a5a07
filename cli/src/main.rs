use std::error::Error;

use clap::{Arg, ArgAction, Command, value_parser};
use gowin_bitstream::Bitstream;
use gowin_chipdb::Database;
use gowin_pack::{DecodeOptions, Design, PackOptions, pack, unpack};
use jzon::JsonValue;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<(), Box<dyn Error>> {
    let m = Command::new("gowin")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::Count),
        )
        .subcommand(
            Command::new("pack")
                .arg(
                    Arg::new("db")
                        .required(true)
                        .value_parser(value_parser!(String)),
                )
                .arg(
                    Arg::new("device")
                        .required(true)
                        .value_parser(value_parser!(String)),
                )
                .arg(
                    Arg::new("netlist")
                        .required(true)
                        .value_parser(value_parser!(String)),
                )
                .arg(
                    Arg::new("out")
                        .required(true)
                        .value_parser(value_parser!(String)),
                )
                .arg(
                    Arg::new("compress")
                        .short('c')
                        .long("compress")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("package")
                        .short('p')
                        .long("package")
                        .value_parser(value_parser!(String)),
                )
                .arg(
                    Arg::new("report")
                        .short('r')
                        .long("report")
                        .value_parser(value_parser!(String)),
                ),
        )
        .subcommand(
            Command::new("unpack")
                .arg(
                    Arg::new("db")
                        .required(true)
                        .value_parser(value_parser!(String)),
                )
                .arg(
                    Arg::new("bitstream")
                        .required(true)
                        .value_parser(value_parser!(String)),
                )
                .arg(
                    Arg::new("device")
                        .short('d')
                        .long("device")
                        .value_parser(value_parser!(String)),
                )
                .arg(
                    Arg::new("noalias")
                        .long("noalias")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("default-modes")
                        .long("default-modes")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("dumpdb")
                .arg(
                    Arg::new("db")
                        .required(true)
                        .value_parser(value_parser!(String)),
                )
                .arg(
                    Arg::new("device")
                        .short('d')
                        .long("device")
                        .value_parser(value_parser!(String)),
                ),
        )
        .get_matches();

    let level = match m.get_count("verbose") {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match m.subcommand() {
        Some(("pack", m)) => {
            let db = Database::from_file(m.get_one::<String>("db").unwrap())?;
            let device = db.device(m.get_one::<String>("device").unwrap())?;
            let design = Design::from_file(m.get_one::<String>("netlist").unwrap())?;
            let opts = PackOptions {
                compress: m.get_flag("compress"),
                package: m.get_one::<String>("package").cloned(),
            };
            let packed = pack(device, &design, &opts)?;
            for pip in &packed.unroutable {
                warn!("{pip}");
            }
            let out = m.get_one::<String>("out").unwrap();
            packed.bitstream.emit_to_file(out)?;
            info!("wrote {out}");
            if let Some(fname) = m.get_one::<String>("report") {
                let mut f = std::fs::File::create(fname)?;
                packed.report.write(&mut f)?;
            }
        }
        Some(("unpack", m)) => {
            let db = Database::from_file(m.get_one::<String>("db").unwrap())?;
            let bitstream = Bitstream::parse_from_file(m.get_one::<String>("bitstream").unwrap())?;
            let name = match m.get_one::<String>("device") {
                Some(name) => name.as_str(),
                None => {
                    bitstream
                        .device_id()
                        .ok_or("cannot determine device from bitstream header")?
                        .name
                }
            };
            let device = db.device(name)?;
            let opts = DecodeOptions {
                default_modes: m.get_flag("default-modes"),
                ignore_alias_gate: m.get_flag("noalias"),
            };
            let unpacked = unpack(device, &bitstream, &opts)?;
            unpacked.dump(device, &mut std::io::stdout())?;
        }
        Some(("dumpdb", m)) => {
            let db = Database::from_file(m.get_one::<String>("db").unwrap())?;
            let json = match m.get_one::<String>("device") {
                Some(name) => JsonValue::from(db.device(name)?),
                None => JsonValue::from(&db),
            };
            println!("{}", json.pretty(2));
        }
        _ => unreachable!(),
    }
    Ok(())
}
