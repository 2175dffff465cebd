use platmark::PLATFORMS;

pub fn cmd_platforms() {
    println!("{:>3}  {:<12} {}", "#", "KEY", "NAME");
    for (i, platform) in PLATFORMS.iter().enumerate() {
        println!("{:>3}  {:<12} {}", i + 1, platform.key, platform.display_name);
    }
    println!("\n({} platforms, watermark files are <key>.png)", PLATFORMS.len());
}
