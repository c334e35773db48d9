use std::{
    env,
    process::exit,
};

use qvpack::{
    config::{Config, Mode},
    QvPack,
};

fn main() {
    let args = env::args().skip(1).collect::<Vec<String>>();

    let cfg = match Config::new(&args) {
        Ok(cfg) => cfg,
        Err(err) => {
            println!("{}", err);
            exit(1);
        }
    };

    let result = match cfg.mode {
        Mode::Encode => QvPack::new(cfg).encode().map(|_| ()),
        Mode::Decode => QvPack::new(cfg).decode().map(|_| ()),
    };

    if let Err(err) = result {
        println!("{}", err);
        exit(1);
    }
}
