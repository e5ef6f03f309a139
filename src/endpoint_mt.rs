extern crate argparse;
extern crate librapidtape;
extern crate rapidmt;

use argparse::{ArgumentParser, Store, StoreTrue, IncrBy};
use std::{env, io, fs};
use std::io::Write;
use log::debug;
use librapidtape::fs::open_tape;
use librapidtape::tape::TapeDevice;
use rapidmt::{units, logger, report};
use rapidmt::command::{parse_operation, Operation};

fn main() -> io::Result<()> {
    //Here's some configuration!
    let mut tapename = env::var("TAPE").unwrap_or_default();
    let mut command = "status".to_string();
    let mut count : i64 = 1;
    let mut filename = "-".to_string();
    let mut blocksize = units::DataSize::from(1024*1024 as usize);
    let mut rewind = false;
    let mut verbosity : usize = 0;

    {
        let mut ap = ArgumentParser::new();

        ap.set_description("Maintenance utility for tape drives");

        ap.refer(&mut tapename).add_option(&["-f"], Store, "The tape device to control (otherwise reads $TAPE). Use emulated or emulatedN for an in-memory tape.");
        ap.refer(&mut filename).add_option(&["-o"], Store, "A file to transfer data to or from. (Use - or don't specify for stdio)");
        ap.refer(&mut blocksize).add_option(&["--bs"], Store, "The (recommended, not required) block size to use when reading or writing to or from the tape.");
        ap.refer(&mut rewind).add_option(&["--rewind"], StoreTrue, "Rewind the tape when done, like a rewinding device node.");
        ap.refer(&mut verbosity).add_option(&["-v"], IncrBy(1usize), "Log what the driver does; repeat for more detail.");
        ap.refer(&mut command).add_argument("operation", Store, "The command to issue to the tape drive.");
        ap.refer(&mut count).add_argument("count", Store, "How many times to repeat the command, or its parameter. (e.g. fsf 2 = skip 2 files, setblk 512 = use 512-byte blocks)");

        ap.parse_args_or_exit();
    }

    if let Err(e) = logger::init(verbosity) {
        eprintln!("Could not install logger: {}", e);
    }

    if tapename == "" {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "Please specify a device name, either with -f or TAPE environment variable"));
    }

    let operation = parse_operation(&command, count)?;
    let mut tapedevice : Box<dyn TapeDevice> = open_tape(&tapename, rewind)?;

    match operation {
        Operation::Control(ops) => {
            for op in ops {
                debug!("issuing {:?} to {}", op, tapename);
                tapedevice.execute(op)?;
            }

            Ok(())
        },
        Operation::Tell => { println!("{}", tapedevice.tell_blocks()?); Ok(()) },
        Operation::Status => { print!("{}", report::status_report(&tapedevice.status()?)); Ok(()) },
        Operation::Read => {
            let mut reader = io::BufReader::with_capacity(blocksize.into_inner(), tapedevice);
            let copied = match filename.as_str() {
                "-" => io::copy(&mut reader, &mut io::stdout()),
                name => io::copy(&mut reader, &mut fs::File::create(name)?)
            }?;

            debug!("read {} from {}", units::DataSize::from(copied), tapename);
            Ok(())
        },
        Operation::Write => {
            let mut writer = io::BufWriter::with_capacity(blocksize.into_inner(), tapedevice);
            let copied = match filename.as_str() {
                "-" => io::copy(&mut io::stdin(), &mut writer),
                name => io::copy(&mut fs::File::open(name)?, &mut writer)
            }?;

            debug!("wrote {} to {}", units::DataSize::from(copied), tapename);
            writer.flush()
        }
    }
}
