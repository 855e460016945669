use anyhow::Result;
use clap::Parser;

use ferry::cli::ClientOpts;
use ferry::client::Session;
use ferry::framer::Framing;

fn main() -> Result<()> {
    let opts = ClientOpts::parse();
    let framing = if opts.legacy_framing {
        Framing::EofMarker
    } else {
        Framing::LengthPrefixed
    };
    let mut session = Session::connect(&opts.host, opts.port, framing)?;
    session.run()
}
