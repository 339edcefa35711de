use iconv_rs::{Charset, IconvError, IconvLibrary};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Honors ICONV_LIBRARY_PATH, otherwise uses the platform iconv.
    let library = IconvLibrary::load_from_env_or_default()?;
    println!("loaded iconv from {}", library.origin());

    let text = "Grüße aus Köln";
    let mut descriptor = library.open("ISO-8859-1", "UTF-8")?;
    let latin1 = descriptor.convert(text.as_bytes())?;
    descriptor.close()?;
    println!("{text:?} -> {} ISO-8859-1 bytes: {latin1:02x?}", latin1.len());

    let target = Charset::new("ASCII").transliterate().to_string();
    let ascii = iconv_rs::convert_once("€ 5, naïve café".as_bytes(), &target, "UTF-8")?;
    println!("{target}: {}", String::from_utf8_lossy(&ascii));

    match iconv_rs::convert_once("price: €5".as_bytes(), "ASCII", "UTF-8") {
        Ok(output) => println!("ASCII: {}", String::from_utf8_lossy(&output)),
        Err(error @ IconvError::Unrepresentable { .. }) => println!(
            "{error}; converted so far: {:?}",
            String::from_utf8_lossy(error.partial_output().unwrap_or_default())
        ),
        Err(error) => return Err(error.into()),
    }

    Ok(())
}
