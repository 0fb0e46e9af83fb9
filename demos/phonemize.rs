use std::path::PathBuf;
use std::time::Instant;

use kokoro_g2p::{
    tokenize,
    vocab::{check_vocab, encode, kokoro_vocab, load_vocab},
    Collaborators, Locale, ResolverConfig, ResolverRegistry, G2P,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let dictionary_dir = PathBuf::from(args.next().unwrap_or_else(|| "tests/fixtures".into()));
    let voice = args.next().unwrap_or_else(|| "af_heart".into());
    // A voice name (`ff_siwis`) or a locale id (`de`).
    let locale = match Locale::from_voice(&voice) {
        Some(locale) => locale,
        None => voice.parse()?,
    };
    let vocab = match args.next() {
        Some(config_path) => load_vocab(PathBuf::from(config_path).as_path())?,
        None => kokoro_vocab(),
    };
    check_vocab(locale, &vocab)?;

    let registry = ResolverRegistry::new(Collaborators::with_dictionary_dir(&dictionary_dir));
    let config = ResolverConfig {
        locale,
        ..ResolverConfig::default()
    };

    let load_start = Instant::now();
    let resolver = registry.get(&config)?;
    println!(
        "Loaded {} dictionaries from {} in {:.2?} (sources: {:?})",
        locale,
        dictionary_dir.display(),
        load_start.elapsed(),
        resolver.adapter_kinds()
    );

    let text = match locale {
        Locale::It => "Ciao! Benvenuti in città, grazie per il caffè dell'anno.",
        Locale::De => "Guten Tag! Das Haus hat eine Küche.",
        Locale::Fr => "Bonjour le monde! Merci pour le pain.",
        _ => "Hello, world! The cats read the news about Kokoro...",
    };

    let resolve_start = Instant::now();
    let tokens = resolver.resolve_all(tokenize(text));
    println!("Resolved {} tokens in {:.2?}", tokens.len(), resolve_start.elapsed());

    for token in &tokens {
        let source = token
            .source
            .map(|kind| kind.to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "  {:<12} {:<16} rating {} ({source})",
            token.text(),
            token.phonemes,
            token.rating
        );
    }

    let phonemes = resolver.phonemize(text);
    println!("Phonemes: {phonemes}");
    println!("Token ids: {:?}", encode(&phonemes, &vocab));
    Ok(())
}
