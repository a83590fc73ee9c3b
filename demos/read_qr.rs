use std::env;
use std::error::Error;

use qrcodec::QRReader;

fn main() -> Result<(), Box<dyn Error>> {
    let path = env::args().nth(1).unwrap_or_else(|| "hello_qr.png".into());
    let img = image::open(&path)?.to_rgb8();

    let decoded = QRReader::detect(&img);
    if decoded.is_empty() {
        println!("No QR code found in: {path}");
        return Ok(());
    }

    for symbol in decoded {
        println!(
            "v{} {:?}, {} codeword(s) corrected: {}",
            symbol.version,
            symbol.ec_level,
            symbol.corrected,
            symbol.text()
        );
    }
    Ok(())
}
