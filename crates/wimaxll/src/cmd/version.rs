use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("wimaxll {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: wimaxll");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("WIMAXLL_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "profile: {}",
        option_env!("WIMAXLL_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "protocol: {} v{}",
        wimaxll_frame::wimax::FAMILY_NAME,
        wimaxll_frame::wimax::GNL_VERSION
    );
    println!(
        "netlink: {}",
        if cfg!(target_os = "linux") {
            "generic"
        } else {
            "unavailable"
        }
    );

    Ok(SUCCESS)
}
