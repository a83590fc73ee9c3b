use std::error::Error;

use qrcodec::{ECLevel, QRBuilder};

fn main() -> Result<(), Box<dyn Error>> {
    // Version and mask are chosen automatically; only the level is pinned
    let qr = QRBuilder::new(b"Hello, World!").ec_level(ECLevel::Q).build()?;

    // Render at 4 pixels per module with a 16 pixel quiet zone
    let img = qr.to_image(4, 16)?;
    img.save("./hello_qr.png")?;

    println!("QR code saved to: hello_qr.png");
    println!("{}", qr.to_str(1));
    Ok(())
}
