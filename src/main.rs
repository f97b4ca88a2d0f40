fn main() {
    lljvm_backend::backend_main();
}
