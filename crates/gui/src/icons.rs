use iced::widget::svg;

const SVG_SCAN: &[u8] = include_bytes!("../assets/icons/scan.svg");
const SVG_SCANNER: &[u8] = include_bytes!("../assets/icons/scanner.svg");

pub fn scan() -> svg::Handle {
    svg::Handle::from_memory(SVG_SCAN)
}

pub fn scanner() -> svg::Handle {
    svg::Handle::from_memory(SVG_SCANNER)
}
