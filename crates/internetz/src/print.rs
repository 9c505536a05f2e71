pub fn print_config_template() {
    println!("{}", include_str!("../internetz-config-template.toml"));
}
